//! DC offset removal on the stereo mix.
//!
//! The summed channel output carries a DC component that varies with
//! pulse duty and envelope activity. A leaky-integrator high-pass
//! (alpha 65450/65536, about 5 Hz at 48 kHz) removes it and adds the
//! slight pulse droop of an AC-coupled output stage.

use super::constants::HPF_ALPHA_Q16;

/// Stereo leaky-integrator high-pass filter.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DcFilter {
    in_l: i64,
    in_r: i64,
    acc_l: i64,
    acc_r: i64,
}

impl DcFilter {
    pub(crate) fn new() -> Self {
        DcFilter::default()
    }

    /// Reset the filter state.
    pub(crate) fn reset(&mut self) {
        *self = DcFilter::default();
    }

    /// Process one stereo sample pair, clamping the result to i32.
    ///
    /// y[n] = alpha * (y[n-1] + x[n] - x[n-1]), with the state held in
    /// Q16 so the difference is shifted up before filtering.
    pub(crate) fn process(&mut self, l: i64, r: i64) -> (i32, i32) {
        let diff_l = l - self.in_l;
        let diff_r = r - self.in_r;

        let acc_l = (HPF_ALPHA_Q16 * (self.acc_l + (diff_l << 16))) >> 16;
        let acc_r = (HPF_ALPHA_Q16 * (self.acc_r + (diff_r << 16))) >> 16;

        self.in_l = l;
        self.in_r = r;
        self.acc_l = acc_l;
        self.acc_r = acc_r;

        (
            (acc_l >> 16).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            (acc_r >> 16).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_constant_offset() {
        let mut filter = DcFilter::new();
        let mut out = (0, 0);
        for _ in 0..100_000 {
            out = filter.process(10_000, -10_000);
        }
        assert!(out.0.abs() < 2, "left settled at {}", out.0);
        assert!(out.1.abs() < 2, "right settled at {}", out.1);
    }

    #[test]
    fn test_passes_step_transient() {
        let mut filter = DcFilter::new();
        for _ in 0..10_000 {
            filter.process(0, 0);
        }
        let (l, r) = filter.process(5_000, 5_000);
        // A step passes through nearly unattenuated on the first sample.
        assert!(l > 4_900, "left step came through as {l}");
        assert_eq!(l, r);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut filter = DcFilter::new();
        for i in 0..1_000i64 {
            filter.process(i * 7, -i * 3);
        }
        filter.reset();
        let (l, r) = filter.process(0, 0);
        assert_eq!((l, r), (0, 0));
    }
}
