//! Operator: phase generation, waveform synthesis, and per-operator state.
//!
//! Each channel runs four operators in series. An operator owns a 10.22
//! phase accumulator, an ADSR envelope, a noise LFSR, the key-on delay
//! counter, and the one-sample edge interpolation state. Phase math
//! follows SID semantics at a 1 MHz reference clock and OPM conventions
//! for detune and multiplier handling.

use super::constants::PCM_RAM_SIZE;
use super::envelope::Envelope;
use super::registers::{
    OpRegs, Waveform, WPAR_ABS_H, WPAR_ABS_L, WPAR_HALF_H, WPAR_HALF_L, WPAR_QUANT,
};
use super::tables::tables;

/// Saturate to 0..65535 before the step conversion.
fn usat16(value: i32) -> u32 {
    value.clamp(0, 0xFFFF) as u32
}

/// Phase step for a 16-bit frequency: Fclk 1 MHz at Fs 48 kHz gives a
/// factor of 16000/3.
pub(crate) fn phase_step_from_freq(freq: i32) -> u32 {
    let freq = usat16(freq);
    (freq * 16_000 + 1) / 3
}

/// Phase step with the raw PM LFO value applied at full vibrato depth
/// scaling (shift 10, about 13.5 cents peak at depth 1).
fn phase_step_fixed(freq16: u16, lfo_raw_pm: i32) -> u32 {
    let delta = (i32::from(freq16) * lfo_raw_pm) >> 10;
    phase_step_from_freq(i32::from(freq16) + delta)
}

// Detune displacement per keycode, verified against Nuked's equations.
// Low two bits select strength 0..3, bit 2 flips the sign.
#[rustfmt::skip]
const DETUNE_ADJUSTMENT: [[u8; 4]; 32] = [
    [0, 0, 1, 2],  [0, 0, 1, 2],  [0, 0, 1, 2],  [0, 0, 1, 2],
    [0, 1, 2, 2],  [0, 1, 2, 3],  [0, 1, 2, 3],  [0, 1, 2, 3],
    [0, 1, 2, 4],  [0, 1, 3, 4],  [0, 1, 3, 4],  [0, 1, 3, 5],
    [0, 2, 4, 5],  [0, 2, 4, 6],  [0, 2, 4, 6],  [0, 2, 5, 7],
    [0, 2, 5, 8],  [0, 3, 6, 8],  [0, 3, 6, 9],  [0, 3, 7, 10],
    [0, 4, 8, 11], [0, 4, 8, 12], [0, 4, 9, 13], [0, 5, 10, 14],
    [0, 5, 11, 16], [0, 6, 12, 17], [0, 6, 13, 19], [0, 7, 14, 20],
    [0, 8, 16, 22], [0, 8, 16, 22], [0, 8, 16, 22], [0, 8, 16, 22],
];

/// Signed phase displacement for a 5-bit keycode and 3-bit detune value.
pub(crate) fn detune_adjustment(detune: u8, keycode: u32) -> i32 {
    let result = i32::from(DETUNE_ADJUSTMENT[(keycode & 31) as usize][(detune & 3) as usize]);
    if detune & 0b100 != 0 {
        -result
    } else {
        result
    }
}

// OPL x.1 multiplier values doubled, with 0 encoding x0.5.
const MULTIPLIER_TABLE: [u8; 16] = [1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 20, 24, 24, 30, 30];

// Fixed-mode base frequencies: 8 + (mul * 247 + 7) / 15.
const FIXED_BASE_TABLE: [u8; 16] = [
    8, 24, 41, 57, 74, 90, 107, 123, 140, 156, 173, 189, 206, 222, 239, 255,
];

/// Ratio-mode phase step: detune is applied before the multiplier so its
/// effect scales with the multiplier, as on the OPM.
pub(crate) fn phase_step_ratio(base_step: u32, keycode: u32, mul: u8, detune: u8) -> u32 {
    let adj = detune_adjustment(detune, keycode);
    let det_step = ((i64::from(base_step) * i64::from(adj)) >> 12) as i32;
    let adjusted = (base_step as i32 + det_step).max(0) as u32;
    let multiplier = u32::from(MULTIPLIER_TABLE[(mul & 0x0F) as usize]);
    // High frequencies with large multipliers exceed 32 bits; the phase
    // accumulator is modular, so the step wraps the same way.
    adjusted.wrapping_mul(multiplier) >> 1
}

/// One step of the 32-bit white-noise LFSR (taps 0, 2, 3, 5 into bit 31).
pub(crate) fn lfsr_white_step(lfsr: u32) -> u32 {
    (lfsr >> 1) | (((lfsr ^ (lfsr >> 2) ^ (lfsr >> 3) ^ (lfsr >> 5)) & 1) << 31)
}

/// One step of the 6-bit tonal-noise LFSR; the low two WPAR bits select
/// the tap configuration. Stuck all-zero/all-one states escape to 0x2A.
pub(crate) fn lfsr_tonal_step(lfsr: u32, taps: u8) -> u32 {
    let bit = match taps & 3 {
        0 => (lfsr >> 3) ^ (lfsr >> 4),
        1 => (lfsr >> 2) ^ (lfsr >> 3),
        2 => lfsr ^ (lfsr >> 2) ^ (lfsr >> 3),
        _ => lfsr ^ (lfsr >> 2) ^ (lfsr >> 3) ^ (lfsr >> 5),
    };
    let next = (lfsr >> 1) | ((bit & 1) << 5);
    if next & 0x3F == 0 || !next & 0x3F == 0 {
        0x2A
    } else {
        next
    }
}

/// Per-channel per-sample context shared by all four operators.
pub(crate) struct OpContext<'a> {
    /// 5-bit keycode decoded from the channel frequency.
    pub keycode: u32,
    /// Key-scale-level base attenuation for the channel frequency.
    pub ksl_atten: u32,
    /// Phase step without vibrato.
    pub step_pm0: u32,
    /// Phase step at half vibrato depth.
    pub step_pm_half: u32,
    /// Phase step at full vibrato depth.
    pub step_pm_full: u32,
    /// Channel duty byte (pulse width and duty-split modifiers).
    pub duty: u8,
    /// PCM restart pointer; base of the sample-as-waveform window.
    pub pcm_restart: u16,
    /// Gate bit as of this sample.
    pub key_live: bool,
    /// True when the envelope generator ticks this sample.
    pub env_tick: bool,
    /// Whole envelope counter value for this tick.
    pub env_counter: u32,
    /// Current AM LFO value at maximum depth.
    pub lfo_am: u8,
    /// PCM sample memory.
    pub pcm: &'a [i8; PCM_RAM_SIZE],
}

/// Transient state of one operator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Operator {
    /// 10.22 phase accumulator.
    pub phase: u32,
    /// Last raw output, pre interpolation (modulators need exact edges).
    pub value: i16,
    /// ADSR envelope.
    pub env: Envelope,
    /// Samples since the key-on edge, capped at i16::MAX.
    pub delay_counter: i32,
    /// True while the key-on delay epoch is counting.
    pub delay_active: bool,
    /// Key state after delay gating; edges trigger attack/release.
    pub key_state: bool,
    /// True when the phase wrapped on the last advance.
    pub wrapped: bool,
    /// Noise LFSR state.
    pub lfsr: u32,
    /// Samples of edge interpolation left (0 or 1).
    pub edge_hold: u8,
    /// Sub-sample position of the detected edge.
    pub edge_frac: u16,
    /// Previous raw waveform sample for edge detection.
    pub edge_prev: i16,
}

impl Operator {
    pub(crate) fn new(seed_index: u32) -> Self {
        let mut op = Operator {
            phase: 0,
            value: 0,
            env: Envelope::new(),
            delay_counter: 0,
            delay_active: false,
            key_state: false,
            wrapped: false,
            lfsr: 0,
            edge_hold: 0,
            edge_frac: 0,
            edge_prev: 0,
        };
        op.phase_reset(seed_index);
        op
    }

    /// Zero the phase and reseed the noise LFSR with a value unique to
    /// this channel/operator slot.
    pub(crate) fn phase_reset(&mut self, seed_index: u32) {
        self.phase = 0;
        self.wrapped = false;
        self.lfsr = 0x1F_FFFF ^ (seed_index << 8);
    }

    /// Begin a key-on delay epoch (gate rising edge).
    pub(crate) fn key_on(&mut self) {
        self.delay_active = true;
        self.delay_counter = 0;
    }

    /// End the delay epoch (gate falling edge).
    pub(crate) fn key_off(&mut self) {
        self.delay_active = false;
        self.delay_counter = 0;
    }

    /// Run the operator for one sample and return the interpolated
    /// output before the OUT-level shift.
    ///
    /// `mod_in` is the phase-modulation input (previous operator, or the
    /// averaged feedback for operator 0), `ring_in` the ring-modulation
    /// sign source, `prev_wrapped` the previous operator's wrap flag
    /// from the last sample.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn run(
        &mut self,
        seed_index: u32,
        regs: &OpRegs,
        ctx: &OpContext<'_>,
        mod_in: i16,
        ring_in: i16,
        prev_wrapped: bool,
    ) -> i32 {
        // Key state with the per-operator onset delay applied. The delay
        // epoch is opened/closed by the gate write; here the counter is
        // compared first and advanced after, so a zero delay keys on in
        // the same sample as the write.
        let delay = regs.delay();
        let delay_target = if delay != 0 { 256i32 << delay } else { 0 };
        let keystate =
            ctx.key_live && (!self.delay_active || self.delay_counter >= delay_target);
        if keystate != self.key_state {
            self.key_state = keystate;
            if keystate {
                self.env.start_attack(regs, ctx.keycode);
            } else {
                self.env.start_release();
            }
        }
        if self.delay_active && self.delay_counter <= i32::from(i16::MAX) {
            self.delay_counter += 1;
        }

        let phase_before = self.phase;

        if ctx.env_tick {
            self.env.clock(regs, ctx.keycode, ctx.env_counter);
        }

        // Hard sync: previous operator's wrap resets our phase.
        if regs.sync() && prev_wrapped {
            self.phase_reset(seed_index);
        } else {
            let step = if regs.fixed_freq() {
                let base = u32::from(FIXED_BASE_TABLE[(regs.multiplier() & 0x0F) as usize]);
                let freq16 = (base << regs.detune()) as u16;
                phase_step_fixed(freq16, 0)
            } else {
                let base_step = if regs.vibrato() {
                    if regs.vibrato_depth() {
                        ctx.step_pm_full
                    } else {
                        ctx.step_pm_half
                    }
                } else {
                    ctx.step_pm0
                };
                phase_step_ratio(base_step, ctx.keycode, regs.multiplier(), regs.detune())
            };
            self.phase = self.phase.wrapping_add(step);
        }
        self.wrapped = self.phase < phase_before;

        // The 6-bit LFSR needs 6 shifts per period, so clocking it on
        // sixths of the operator cycle makes its repeat rate track the
        // operator frequency.
        let wave = regs.waveform();
        if wave.is_noise()
            && ((self.phase >> 8) * 6) >> 24 != ((phase_before >> 8) * 6) >> 24
        {
            self.lfsr = if wave == Waveform::Noise {
                lfsr_white_step(self.lfsr)
            } else {
                lfsr_tonal_step(self.lfsr, regs.wave_param())
            };
        }

        let mut val: i32 = 0;

        if self.env.attenuation < super::constants::QUIET_ATTENUATION {
            let mod_depth = regs.mod_depth();
            let p_mod: i16 = if mod_depth == 0 {
                0
            } else {
                mod_in >> (8 - mod_depth)
            };
            let wpar = regs.wave_param();

            // Round the 10.22 phase to 10 bits before modulation.
            let mut phase =
                ((self.phase.wrapping_add(1 << 21) >> 22) as i32 + i32::from(p_mod)) & 0x3FF;

            let mut sample: i32;
            let mut need_edge = false;

            match wave {
                Waveform::Sine | Waveform::Triangle | Waveform::Sawtooth => {
                    if wpar & WPAR_QUANT != 0 {
                        // WPAR[2:0] quantizes phase by zeroing LSBs.
                        phase &= !((1 << ((wpar & 0x07) + 1)) - 1);
                    }
                    let t = tables();
                    sample = i32::from(match wave {
                        Waveform::Sine => t.sine[phase as usize],
                        Waveform::Triangle => t.triangle[phase as usize],
                        _ => t.sawtooth[phase as usize],
                    });
                    if wpar < WPAR_QUANT {
                        let high = (phase >> 3) >= i32::from(ctx.duty);
                        sample = match wpar {
                            WPAR_HALF_L => if high { sample } else { 0 },
                            WPAR_HALF_H => if high { 0 } else { sample },
                            WPAR_ABS_L => if high { sample } else { -sample },
                            WPAR_ABS_H => if high { -sample } else { sample },
                            _ => sample,
                        };
                    }
                    // A jump of more than half the range is a hard edge.
                    let delta = sample - i32::from(self.edge_prev);
                    need_edge = delta > i32::from(i16::MAX) || delta < i32::from(i16::MIN);
                }
                Waveform::Pulse => {
                    // 7-bit ramp against duty; WPAR 1..15 selects a fixed
                    // width in sixteenths instead of the channel duty.
                    let duty = if wpar != 0 { wpar << 3 } else { ctx.duty };
                    sample = if (phase >> 3) >= i32::from(duty) {
                        i32::from(i16::MAX)
                    } else {
                        i32::from(i16::MIN)
                    };
                    need_edge = sample != i32::from(self.edge_prev);
                }
                Waveform::Noise | Waveform::PeriodicNoise => {
                    sample = if self.lfsr & 1 != 0 {
                        i32::from(i16::MAX)
                    } else {
                        i32::from(i16::MIN)
                    };
                }
                Waveform::Reserved6 => {
                    sample = 0;
                }
                Waveform::Sample => {
                    // 1024-sample window anchored at the PCM restart
                    // pointer, looping via the phase wraparound.
                    let addr = (usize::from(ctx.pcm_restart) + phase as usize) & (PCM_RAM_SIZE - 1);
                    sample = i32::from(i16::from(ctx.pcm[addr]) << 8);
                }
            }

            if need_edge {
                // One sample of interpolation; the fractional phase says
                // how early in the sample the edge landed.
                self.edge_hold = 1;
                self.edge_frac = (self.phase >> 6) as u16;
            }
            self.edge_prev = sample as i16;

            // 1-bit ring modulation: flip the sign on a negative source.
            if regs.ring() && ring_in < 0 {
                sample = -sample;
            }

            let mut env_att = u32::from(self.env.attenuation);
            if regs.tremolo() {
                let mut am_offset = u32::from(ctx.lfo_am);
                if !regs.tremolo_depth() {
                    am_offset >>= 2;
                }
                env_att += am_offset;
            }
            env_att += u32::from(regs.total_level()) << 3;
            let ksl = regs.key_scale_level();
            if ksl != 0 {
                env_att += ctx.ksl_atten << ksl;
            }
            env_att = env_att.min(0x3FF);

            let amp = sample * i32::from(tables().env_gain[env_att as usize]);
            val = (amp + (1 << 14)) >> 15;
        }

        let out_delta = val - i32::from(self.value);
        self.value = val as i16;

        if self.edge_hold > 0 {
            val -= (out_delta * (65_536 - i32::from(self.edge_frac))) >> 16;
            self.edge_hold -= 1;
        }

        val
    }
}

impl Default for Operator {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_step_matches_clock_ratio() {
        // 16000/3 per frequency unit, rounded up by the +1.
        assert_eq!(phase_step_from_freq(0), 0);
        assert_eq!(phase_step_from_freq(3), 16_000);
        assert_eq!(phase_step_from_freq(0xFFFF), (0xFFFF * 16_000 + 1) / 3);
        // Negative and oversized inputs saturate.
        assert_eq!(phase_step_from_freq(-5), 0);
        assert_eq!(phase_step_from_freq(0x2_0000), (0xFFFF * 16_000 + 1) / 3);
    }

    #[test]
    fn test_detune_sign_encoding() {
        assert_eq!(detune_adjustment(0, 20), 0);
        assert_eq!(detune_adjustment(4, 20), 0);
        assert_eq!(detune_adjustment(3, 20), 11);
        assert_eq!(detune_adjustment(7, 20), -11);
        assert_eq!(detune_adjustment(1, 20), 4);
        assert_eq!(detune_adjustment(5, 20), -4);
        assert_eq!(detune_adjustment(2, 31), 16);
        assert_eq!(detune_adjustment(6, 31), -16);
    }

    #[test]
    fn test_multiplier_halves_and_doubles() {
        // MUL=0 is x0.5, MUL=2 is x2.
        assert_eq!(phase_step_ratio(1000, 0, 0, 0), 500);
        assert_eq!(phase_step_ratio(1000, 0, 1, 0), 1000);
        assert_eq!(phase_step_ratio(1000, 0, 2, 0), 2000);
        assert_eq!(phase_step_ratio(1000, 0, 15, 0), 15_000);
    }

    #[test]
    fn test_extreme_step_wraps_like_the_accumulator() {
        // Top frequency with MUL=15 overflows 32 bits; the step wraps
        // modulo 2^32 before the halving shift.
        let base = phase_step_from_freq(0xFFFF);
        assert_eq!(base, 349_520_000);
        let product = (u64::from(base) * 30) as u32;
        assert_eq!(phase_step_ratio(base, 0, 15, 0), product >> 1);
    }

    #[test]
    fn test_white_lfsr_never_sticks() {
        let mut lfsr = 0x1F_FFFF;
        for _ in 0..100_000 {
            lfsr = lfsr_white_step(lfsr);
            assert_ne!(lfsr, 0);
        }
    }

    #[test]
    fn test_tonal_lfsr_escapes_stuck_states() {
        assert_eq!(lfsr_tonal_step(0, 0), 0x2A);
        // A healthy state stays within 6 bits and non-stuck.
        let mut lfsr = 0x2A;
        for _ in 0..200 {
            lfsr = lfsr_tonal_step(lfsr, 3);
            assert_ne!(lfsr & 0x3F, 0);
            assert_ne!(!lfsr & 0x3F, 0);
        }
    }

    #[test]
    fn test_phase_reset_seeds_unique_lfsr() {
        let mut a = Operator::new(0);
        let mut b = Operator::new(1);
        a.phase_reset(0);
        b.phase_reset(1);
        assert_ne!(a.lfsr, b.lfsr);
        assert_eq!(a.lfsr, 0x1F_FFFF);
        assert_eq!(b.lfsr, 0x1F_FFFF ^ 0x100);
    }
}
