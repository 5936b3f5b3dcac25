//! Resonant state-variable filter, one per channel.
//!
//! A Chamberlin SVF in fixed point with soft saturation on the
//! integrators, giving the low/high/band outputs the channel control
//! register can mix. Resonance both raises the input drive and lowers
//! the damping feedback.

/// Piecewise-linear soft saturation: knee at +/-24576 with a 4:1
/// compression slope above it. No division, no floats.
pub(crate) fn saturate(x: i32) -> i32 {
    if x > 24_576 {
        24_576 + ((x - 24_576) >> 2)
    } else if x < -24_576 {
        -24_576 + ((x + 24_576) >> 2)
    } else {
        x
    }
}

/// Filter state and the per-sample update.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Svf {
    pub low: i32,
    pub high: i32,
    pub band: i32,
}

/// Which SVF outputs to mix into the channel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SvfMix {
    pub low: bool,
    pub high: bool,
    pub band: bool,
}

impl Svf {
    pub(crate) fn new() -> Self {
        Svf::default()
    }

    /// Zero the integrators (filter phase reset, mute, chip reset).
    pub(crate) fn reset(&mut self) {
        *self = Svf::default();
    }

    /// Run one sample through the filter and return the mixed output.
    pub(crate) fn run(&mut self, input: i32, cutoff: u16, reson: u8, mix: SvfMix) -> i32 {
        let ff = i64::from(cutoff) * 3;
        let reson = i32::from(reson);

        let drive = 256 + (reson >> 1);
        let driven = saturate((input * drive) >> 8);

        self.low = saturate(self.low + ((ff * i64::from(self.band)) >> 16) as i32);
        self.high = driven - self.low - (((256 - reson) * self.band) >> 8);
        self.band = saturate(((ff * i64::from(self.high)) >> 16) as i32 + self.band);

        (if mix.low { self.low } else { 0 })
            + (if mix.high { self.high } else { 0 })
            + (if mix.band { self.band } else { 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LP: SvfMix = SvfMix {
        low: true,
        high: false,
        band: false,
    };

    #[test]
    fn test_saturate_passes_below_knee() {
        assert_eq!(saturate(0), 0);
        assert_eq!(saturate(24_576), 24_576);
        assert_eq!(saturate(-24_576), -24_576);
        assert_eq!(saturate(12_345), 12_345);
    }

    #[test]
    fn test_saturate_compresses_above_knee() {
        assert_eq!(saturate(24_580), 24_577);
        assert_eq!(saturate(-24_580), -24_577);
        // 4:1 slope above the knee.
        assert_eq!(saturate(24_576 + 4000), 24_576 + 1000);
        assert_eq!(saturate(-24_576 - 4000), -24_576 - 1000);
    }

    #[test]
    fn test_lowpass_converges_to_dc_input() {
        let mut svf = Svf::new();
        let mut out = 0;
        for _ in 0..20_000 {
            out = svf.run(10_000, 0x1000, 0, LP);
        }
        // DC passes a low-pass close to unity.
        assert!((out - 10_000).abs() < 1_500, "out = {out}");
    }

    #[test]
    fn test_zero_cutoff_blocks_lowpass() {
        let mut svf = Svf::new();
        let mut out = 0;
        for _ in 0..1_000 {
            out = svf.run(10_000, 0, 0, LP);
        }
        assert_eq!(out, 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut svf = Svf::new();
        for _ in 0..100 {
            svf.run(20_000, 0x2000, 128, LP);
        }
        svf.reset();
        assert_eq!(svf.low, 0);
        assert_eq!(svf.high, 0);
        assert_eq!(svf.band, 0);
    }
}
