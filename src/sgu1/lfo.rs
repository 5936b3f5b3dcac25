//! Global low-frequency oscillator for tremolo (AM) and vibrato (PM).
//!
//! Both LFOs run at fixed rates shared by every operator; per-operator
//! depth bits scale the values downstream. The AM LFO is a 210*64-step
//! triangle (about 3.6 Hz at 48 kHz), the PM LFO an 8192-step pattern of
//! eight signed fractions (about 5.9 Hz).

/// PM pattern, a 1.3 fraction-and-sign applied to the channel frequency.
const PM_SCALE: [i8; 8] = [8, 4, 0, -4, -8, -4, 0, 4];

const AM_PERIOD: u16 = 210 * 64;

/// Global LFO state.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Lfo {
    am_counter: u16,
    pm_counter: u16,
    /// Current AM attenuation offset at maximum depth.
    pub am: u8,
}

impl Lfo {
    pub(crate) fn new() -> Self {
        Lfo::default()
    }

    pub(crate) fn reset(&mut self) {
        *self = Lfo::default();
    }

    /// Advance both LFOs by one sample and return the raw PM value.
    pub(crate) fn clock(&mut self) -> i32 {
        let am_counter = self.am_counter;
        self.am_counter = if am_counter >= AM_PERIOD - 1 {
            0
        } else {
            am_counter + 1
        };

        // Triangle fold across the midpoint; low 7 bits are fractional.
        self.am = (if am_counter < AM_PERIOD / 2 {
            am_counter
        } else {
            AM_PERIOD + 63 - am_counter
        } >> 7) as u8;

        let pm_counter = self.pm_counter;
        self.pm_counter = pm_counter.wrapping_add(1);
        i32::from(PM_SCALE[((pm_counter >> 10) & 7) as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_am_triangle_peaks_at_midpoint() {
        let mut lfo = Lfo::new();
        let mut peak = 0u8;
        for _ in 0..u32::from(AM_PERIOD) {
            lfo.clock();
            peak = peak.max(lfo.am);
        }
        // 105*64 >> 7 = 52 at the fold, back near zero at the ends.
        assert_eq!(peak, 52);
        assert!(lfo.am <= 1);
    }

    #[test]
    fn test_am_counter_wraps_to_zero() {
        let mut lfo = Lfo::new();
        for _ in 0..u32::from(AM_PERIOD) + 5 {
            lfo.clock();
        }
        assert!(lfo.am_counter < AM_PERIOD);
    }

    #[test]
    fn test_pm_pattern_cycles() {
        let mut lfo = Lfo::new();
        // First 1024 samples read pattern slot 0.
        assert_eq!(lfo.clock(), 8);
        for _ in 1..1024 {
            assert_eq!(lfo.clock(), 8);
        }
        assert_eq!(lfo.clock(), 4);
        // Pattern sums to zero over a full period.
        let mut lfo = Lfo::new();
        let sum: i64 = (0..8192).map(|_| i64::from(lfo.clock())).sum();
        assert_eq!(sum, 0);
    }
}
