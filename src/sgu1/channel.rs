//! Per-channel processing: the operator loop and the post-processor.
//!
//! Each sample a channel either plays PCM or runs its four operators,
//! then applies ring modulation, volume, the resonant filter, panning,
//! the three parameter sweeps, and any pending phase resets. Swept
//! parameters (volume, frequency, cutoff) and the PCM position are
//! written back into the register bank so reads observe them.

use super::constants::{OPS_PER_CHANNEL, PCM_RAM_SIZE};
use super::envelope::{freq16_decode, key_scale_atten};
use super::filter::{Svf, SvfMix};
use super::operator::{phase_step_from_freq, OpContext, Operator};
use super::registers::{ChannelCtrl, ChannelMode, RegisterBank, SweepRegs};
use super::tables::tables;

/// Global per-sample values computed once by the chip.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SampleClock {
    /// Raw PM LFO value for this sample.
    pub lfo_raw_pm: i32,
    /// AM LFO value at maximum depth.
    pub lfo_am: u8,
    /// True when the envelope generator ticks this sample.
    pub env_tick: bool,
    /// Whole envelope counter for this tick.
    pub env_counter: u32,
}

/// Transient state of one channel.
#[derive(Debug, Clone)]
pub(crate) struct Channel {
    /// The four operators.
    pub ops: [Operator; OPS_PER_CHANNEL],
    /// Operator 0 output from two samples ago, for averaged feedback.
    pub op0_feedback: i16,
    /// Resonant filter state.
    pub svf: Svf,
    vol_sweep_countdown: i32,
    freq_sweep_countdown: i32,
    cut_sweep_countdown: i32,
    reset_countdown: i32,
    /// PCM fractional position accumulator (threshold 0x8000).
    pcm_accum: u32,
    /// Raw operator sum, saturated to i16; feeds ring modulation.
    pub raw: i16,
    /// Post-processed mono sample (after volume and filter, before pan).
    pub post: i32,
}

impl Channel {
    pub(crate) fn new(ch: usize) -> Self {
        let mut channel = Channel {
            ops: [Operator::default(); OPS_PER_CHANNEL],
            op0_feedback: 0,
            svf: Svf::new(),
            vol_sweep_countdown: 1,
            freq_sweep_countdown: 1,
            cut_sweep_countdown: 1,
            reset_countdown: 0,
            pcm_accum: 0,
            raw: 0,
            post: 0,
        };
        channel.reset(ch);
        channel
    }

    fn seed_index(ch: usize, op: usize) -> u32 {
        (ch * OPS_PER_CHANNEL + op) as u32
    }

    /// Return the channel to its power-on state.
    pub(crate) fn reset(&mut self, ch: usize) {
        for (op, state) in self.ops.iter_mut().enumerate() {
            *state = Operator::new(Self::seed_index(ch, op));
        }
        self.op0_feedback = 0;
        self.svf.reset();
        // Countdowns start at 1 so the first decrement lands at 0.
        self.vol_sweep_countdown = 1;
        self.freq_sweep_countdown = 1;
        self.cut_sweep_countdown = 1;
        self.reset_countdown = 0;
        self.pcm_accum = 0;
        self.raw = 0;
        self.post = 0;
    }

    /// Open or close the key-on delay epochs on a gate edge.
    pub(crate) fn gate_edge(&mut self, on: bool) {
        for op in &mut self.ops {
            if on {
                op.key_on();
            } else {
                op.key_off();
            }
        }
    }

    /// Run the channel for one sample and return its stereo contribution.
    ///
    /// `ring_input` is the previous sample's raw output of the next
    /// channel in the ring.
    pub(crate) fn run(
        &mut self,
        ch: usize,
        bank: &mut RegisterBank,
        pcm: &[i8; PCM_RAM_SIZE],
        ring_input: i16,
        clock: &SampleClock,
        muted: bool,
    ) -> (i32, i32) {
        let freq = bank.freq(ch);
        let ctrl = bank.ctrl(ch);
        let key_live = ctrl.contains(ChannelCtrl::GATE);

        let mut ch_sample: i32 = 0;

        if ctrl.contains(ChannelCtrl::PCM) {
            ch_sample = self.run_pcm(ch, bank, pcm, freq);
        } else {
            let (keycode, block, fnum_4msb) = freq16_decode(freq);
            let ksl_atten = key_scale_atten(block, fnum_4msb);
            let pm_mul = i32::from(freq) * clock.lfo_raw_pm;
            let ctx = OpContext {
                keycode,
                ksl_atten,
                step_pm0: phase_step_from_freq(i32::from(freq)),
                step_pm_half: phase_step_from_freq(i32::from(freq) + (pm_mul >> 11)),
                step_pm_full: phase_step_from_freq(i32::from(freq) + (pm_mul >> 10)),
                duty: bank.duty(ch),
                pcm_restart: bank.pcm_restart(ch),
                key_live,
                env_tick: clock.env_tick,
                env_counter: clock.env_counter,
                lfo_am: clock.lfo_am,
                pcm,
            };

            // Wrap flags from the previous sample; hard sync always sees
            // a uniform one-sample lag.
            let wrapped: [bool; OPS_PER_CHANNEL] = [
                self.ops[0].wrapped,
                self.ops[1].wrapped,
                self.ops[2].wrapped,
                self.ops[3].wrapped,
            ];

            for op in 0..OPS_PER_CHANNEL {
                let regs = bank.op_regs(ch, op);
                let (mod_in, ring_in) = if op > 0 {
                    let prev = self.ops[op - 1].value;
                    (prev, prev)
                } else {
                    (
                        (self.op0_feedback + self.ops[0].value) >> 2,
                        self.ops[OPS_PER_CHANNEL - 1].value,
                    )
                };
                let prev_wrapped = wrapped[(op + OPS_PER_CHANNEL - 1) % OPS_PER_CHANNEL];

                if op == 0 {
                    self.op0_feedback = self.ops[0].value;
                }

                let val = self.ops[op].run(
                    Self::seed_index(ch, op),
                    &regs,
                    &ctx,
                    mod_in,
                    ring_in,
                    prev_wrapped,
                );

                let out = regs.out_level();
                if out != 0 {
                    ch_sample += i32::from(val as i16) >> (7 - out);
                }
            }
        }

        // Raw FM output for the ring-modulation bus.
        let raw = ch_sample.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;

        if ctrl.contains(ChannelCtrl::RING_MOD) {
            ch_sample = (ch_sample * i32::from(ring_input)) >> 15;
        }
        self.raw = raw;

        let mut voice = (ch_sample * i32::from(bank.vol(ch))) >> 7;

        if ctrl.filter_enabled() {
            let mix = SvfMix {
                low: ctrl.contains(ChannelCtrl::FILTER_LOW),
                high: ctrl.contains(ChannelCtrl::FILTER_HIGH),
                band: ctrl.contains(ChannelCtrl::FILTER_BAND),
            };
            voice = self.svf.run(voice, bank.cutoff(ch), bank.reson(ch), mix);
        }

        self.post = voice;

        let t = tables();
        let pan = bank.pan(ch) as usize;
        let mut out_l = (voice * i32::from(t.pan_l[pan])) >> 7;
        let mut out_r = (voice * i32::from(t.pan_r[pan])) >> 7;

        self.run_sweeps(ch, bank);
        self.run_resets(ch, bank);

        if muted {
            // Also drop the filter state so unmuting has no stale ringing.
            self.svf.reset();
            out_l = 0;
            out_r = 0;
        }

        (out_l, out_r)
    }

    /// PCM playback: signed 8-bit samples scaled to the operator output
    /// range, advanced by a fractional accumulator.
    fn run_pcm(
        &mut self,
        ch: usize,
        bank: &mut RegisterBank,
        pcm: &[i8; PCM_RAM_SIZE],
        freq: u16,
    ) -> i32 {
        let mut pos = bank.pcm_pos(ch);
        let end = bank.pcm_end(ch);
        let looping = bank.mode(ch).contains(ChannelMode::PCM_LOOP);

        let sample = i32::from(i16::from(pcm[usize::from(pos)]) << 6);

        self.pcm_accum += u32::from(freq.min(0x8000));
        if self.pcm_accum >= 0x8000 {
            self.pcm_accum -= 0x8000;
            if pos < end {
                pos = pos.wrapping_add(1);
                if pos == end && looping {
                    pos = bank.pcm_restart(ch);
                }
            } else if looping {
                pos = bank.pcm_restart(ch);
            }
            bank.set_pcm_pos(ch, pos);
        }

        sample
    }

    fn run_sweeps(&mut self, ch: usize, bank: &mut RegisterBank) {
        let mode = bank.mode(ch);

        let sw = bank.vol_sweep(ch);
        if mode.contains(ChannelMode::VOL_SWEEP) && sw.speed != 0 {
            self.vol_sweep_countdown -= 1;
            if self.vol_sweep_countdown <= 0 {
                self.vol_sweep_countdown += i32::from(sw.speed);
                apply_vol_sweep(ch, bank, sw);
            }
        }

        let sw = bank.freq_sweep(ch);
        if mode.contains(ChannelMode::FREQ_SWEEP) && sw.speed != 0 {
            self.freq_sweep_countdown -= 1;
            if self.freq_sweep_countdown <= 0 {
                self.freq_sweep_countdown += i32::from(sw.speed);
                apply_freq_sweep(ch, bank, sw);
            }
        }

        let sw = bank.cut_sweep(ch);
        if mode.contains(ChannelMode::CUT_SWEEP) && sw.speed != 0 {
            self.cut_sweep_countdown -= 1;
            if self.cut_sweep_countdown <= 0 {
                self.cut_sweep_countdown += i32::from(sw.speed);
                apply_cut_sweep(ch, bank, sw);
            }
        }
    }

    fn run_resets(&mut self, ch: usize, bank: &mut RegisterBank) {
        let mode = bank.mode(ch);
        let restimer = bank.reset_timer(ch);

        if mode.contains(ChannelMode::PHASE_RESET) {
            for op in 0..OPS_PER_CHANNEL {
                self.ops[op].phase_reset(Self::seed_index(ch, op));
            }
            self.reset_countdown = i32::from(restimer);
            bank.clear_mode(ch, ChannelMode::PHASE_RESET);
        }

        if mode.contains(ChannelMode::FILTER_PHASE_RESET) {
            self.svf.reset();
            bank.clear_mode(ch, ChannelMode::FILTER_PHASE_RESET);
        }

        if mode.contains(ChannelMode::TIMER_SYNC) && restimer != 0 {
            self.reset_countdown -= 1;
            if self.reset_countdown <= 0 {
                self.reset_countdown += i32::from(restimer);
                for op in 0..OPS_PER_CHANNEL {
                    self.ops[op].phase_reset(Self::seed_index(ch, op));
                }
            }
        }
    }
}

/// Volume sweep step. The amount byte packs the 5-bit step with bit 5 as
/// direction (1 = up), bit 6 as wrap and bit 7 as bounce; bounce flips
/// the direction bit in the register.
fn apply_vol_sweep(ch: usize, bank: &mut RegisterBank, sw: SweepRegs) {
    let amt = sw.amount;
    let step = i32::from(amt & 31);
    let bound = sw.bound as i8;

    if amt & 32 != 0 {
        // up
        let mut vol = (i32::from(bank.vol(ch)) + step).clamp(-128, 127) as i8;
        if vol > bound && amt & 64 == 0 {
            vol = bound;
        }
        if (vol as u8) & 0x80 != 0 {
            if amt & 64 != 0 {
                if amt & 128 != 0 {
                    bank.set_vol_sweep_amount(ch, amt ^ 32);
                    vol = (0xFFu8.wrapping_sub(vol as u8)) as i8; // reflect
                } else {
                    vol = ((vol as u8) & 0x7F) as i8; // wrap into positive
                }
            } else {
                vol = 0x7F;
            }
        }
        bank.set_vol(ch, vol);
    } else {
        // down
        let mut vol = (i32::from(bank.vol(ch)) - step).clamp(-128, 127) as i8;
        if (vol as u8) & 0x80 != 0 {
            if amt & 64 != 0 {
                if amt & 128 != 0 {
                    bank.set_vol_sweep_amount(ch, amt ^ 32);
                    vol = vol.wrapping_neg();
                } else {
                    vol = ((vol as u8) & 0x7F) as i8;
                }
            } else {
                vol = 0;
            }
        }
        if vol < bound && amt & 64 == 0 {
            vol = bound;
        }
        bank.set_vol(ch, vol);
    }
}

/// Frequency sweep: multiplicative, bit 7 of the amount selects up.
fn apply_freq_sweep(ch: usize, bank: &mut RegisterBank, sw: SweepRegs) {
    let amt = u32::from(sw.amount & 127);
    let bound = sw.bound;
    let freq = bank.freq(ch);

    if sw.amount & 128 != 0 {
        if u32::from(freq) > 0xFFFF - amt {
            bank.set_freq(ch, 0xFFFF);
        } else {
            // Multiply by 1.0 + amt/128.
            let mut f = ((u32::from(freq) * (0x80 + amt)) >> 7) as u16;
            if (f >> 8) as u8 > bound {
                f = u16::from(bound) << 8;
            }
            bank.set_freq(ch, f);
        }
    } else if u32::from(freq) < amt {
        bank.set_freq(ch, 0);
    } else {
        // Multiply by 1.0 - amt/256.
        let mut f = ((u32::from(freq) * (0xFF - amt)) >> 8) as u16;
        if ((f >> 8) as u8) < bound {
            f = u16::from(bound) << 8;
        }
        bank.set_freq(ch, f);
    }
}

/// Cutoff sweep: additive going up, multiplicative going down.
fn apply_cut_sweep(ch: usize, bank: &mut RegisterBank, sw: SweepRegs) {
    let amt = u32::from(sw.amount & 127);
    let bound = sw.bound;
    let cutoff = bank.cutoff(ch);

    if sw.amount & 128 != 0 {
        if u32::from(cutoff) > 0xFFFF - amt {
            bank.set_cutoff(ch, 0xFFFF);
        } else {
            let mut c = cutoff + amt as u16;
            if (c >> 8) as u8 > bound {
                c = u16::from(bound) << 8;
            }
            bank.set_cutoff(ch, c);
        }
    } else if u32::from(cutoff) < amt {
        bank.set_cutoff(ch, 0);
    } else {
        // Multiply by 1.0 - amt/2048.
        let mut c = (((2048 - amt) * u32::from(cutoff)) >> 11) as u16;
        if ((c >> 8) as u8) < bound {
            c = u16::from(bound) << 8;
        }
        bank.set_cutoff(ch, c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sgu1::constants::ch_reg;

    fn sweep(speed: u16, amount: u8, bound: u8) -> SweepRegs {
        SweepRegs {
            speed,
            amount,
            bound,
        }
    }

    #[test]
    fn test_vol_sweep_down_clamps_at_bound() {
        let mut bank = RegisterBank::new();
        bank.set_vol(0, 10);
        for _ in 0..20 {
            apply_vol_sweep(0, &mut bank, sweep(1, 1, 3));
        }
        assert_eq!(bank.vol(0), 3);
    }

    #[test]
    fn test_vol_sweep_down_stops_at_zero_without_wrap() {
        let mut bank = RegisterBank::new();
        bank.set_vol(0, 5);
        for _ in 0..10 {
            apply_vol_sweep(0, &mut bank, sweep(1, 2, 0));
        }
        assert_eq!(bank.vol(0), 0);
    }

    #[test]
    fn test_vol_sweep_up_clamps_at_top() {
        let mut bank = RegisterBank::new();
        bank.set_vol(0, 120);
        for _ in 0..5 {
            apply_vol_sweep(0, &mut bank, sweep(1, 32 | 31, 127));
        }
        assert_eq!(bank.vol(0), 127);
    }

    #[test]
    fn test_vol_sweep_up_wraps_when_enabled() {
        let mut bank = RegisterBank::new();
        bank.set_vol(0, 126);
        apply_vol_sweep(0, &mut bank, sweep(1, 32 | 64 | 4, 0));
        // 126 + 4 clamps to 127 and never goes negative, so no wrap yet.
        assert_eq!(bank.vol(0), 127);
    }

    #[test]
    fn test_vol_sweep_down_bounce_flips_direction() {
        let mut bank = RegisterBank::new();
        bank.write(0x36, 128 | 64 | 3); // bounce + wrap, step 3, down
        bank.set_vol(0, 1);
        let sw = bank.vol_sweep(0);
        apply_vol_sweep(0, &mut bank, sw);
        // 1 - 3 = -2 reflects to 2 and the direction bit flips to up.
        assert_eq!(bank.vol(0), 2);
        assert_ne!(bank.vol_sweep(0).amount & 32, 0);
    }

    #[test]
    fn test_freq_sweep_up_saturates() {
        let mut bank = RegisterBank::new();
        bank.set_freq(0, 0xFFF0);
        apply_freq_sweep(0, &mut bank, sweep(1, 128 | 100, 0xFF));
        assert_eq!(bank.freq(0), 0xFFFF);
    }

    #[test]
    fn test_freq_sweep_up_respects_bound() {
        let mut bank = RegisterBank::new();
        bank.set_freq(0, 0x4000);
        for _ in 0..200 {
            apply_freq_sweep(0, &mut bank, sweep(1, 128 | 8, 0x50));
        }
        assert_eq!(bank.freq(0), 0x5000);
    }

    #[test]
    fn test_freq_sweep_down_reaches_zero() {
        let mut bank = RegisterBank::new();
        bank.set_freq(0, 0x1000);
        for _ in 0..2_000 {
            apply_freq_sweep(0, &mut bank, sweep(1, 64, 0));
        }
        assert_eq!(bank.freq(0), 0);
    }

    #[test]
    fn test_cut_sweep_up_is_additive() {
        let mut bank = RegisterBank::new();
        bank.set_cutoff(0, 0x100);
        apply_cut_sweep(0, &mut bank, sweep(1, 128 | 16, 0xFF));
        assert_eq!(bank.cutoff(0), 0x110);
    }

    #[test]
    fn test_cut_sweep_down_is_multiplicative() {
        let mut bank = RegisterBank::new();
        bank.set_cutoff(0, 0x800);
        apply_cut_sweep(0, &mut bank, sweep(1, 64, 0));
        assert_eq!(bank.cutoff(0), ((2048 - 64) * 0x800 >> 11) as u16);
    }

    #[test]
    fn test_pcm_advance_and_loop() {
        let mut bank = RegisterBank::new();
        let mut channel = Channel::new(0);
        let pcm = Box::new([0i8; PCM_RAM_SIZE]);
        bank.write(ch_reg::MODE as u16, ChannelMode::PCM_LOOP.bits());
        bank.set_pcm_pos(0, 8);
        bank.write(ch_reg::PCM_END_L as u16, 12);
        bank.write(ch_reg::PCM_RST_L as u16, 8);

        // Full-rate playback advances one position per sample.
        for _ in 0..32 {
            channel.run_pcm(0, &mut bank, &pcm, 0x8000);
            let pos = bank.pcm_pos(0);
            assert!((8..12).contains(&pos), "pos = {pos}");
        }
    }

    #[test]
    fn test_pcm_half_rate_advances_every_other_sample() {
        let mut bank = RegisterBank::new();
        let mut channel = Channel::new(0);
        let pcm = Box::new([0i8; PCM_RAM_SIZE]);
        bank.write(ch_reg::PCM_END_L as u16, 100);

        channel.run_pcm(0, &mut bank, &pcm, 0x4000);
        assert_eq!(bank.pcm_pos(0), 0);
        channel.run_pcm(0, &mut bank, &pcm, 0x4000);
        assert_eq!(bank.pcm_pos(0), 1);
    }
}
