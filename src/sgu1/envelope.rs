//! ADSR envelope generator.
//!
//! Envelopes work in a 10-bit logarithmic attenuation domain (0 = full
//! volume, 0x3FF = silent) and are clocked at the sample rate divided by
//! three. Rate and increment handling follows the OPN family: a 6-bit
//! effective rate selects a shift of the global envelope counter plus a
//! sub-cycle increment pattern, and key scaling folds the channel
//! keycode into the rate.

use super::registers::OpRegs;

/// Envelope phase. Ordering matters: `Release` compares greatest so
/// "already released" checks can use `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum EnvelopeState {
    /// Attenuation falling toward 0.
    Attack,
    /// Attenuation rising toward the sustain level.
    Decay,
    /// Attenuation rising at the sustain rate.
    Sustain,
    /// Key released; attenuation rising toward silence.
    Release,
}

/// Per-operator envelope state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Envelope {
    /// Current 10-bit attenuation.
    pub attenuation: u16,
    /// Current ADSR phase.
    pub state: EnvelopeState,
}

impl Envelope {
    pub(crate) fn new() -> Self {
        Envelope {
            attenuation: 0x3FF,
            state: EnvelopeState::Release,
        }
    }

    /// Enter attack on a key-on edge. Effective attack rates of 62 and
    /// 63 jump straight to zero attenuation instead of ramping.
    pub(crate) fn start_attack(&mut self, regs: &OpRegs, keycode: u32) {
        if self.state == EnvelopeState::Attack {
            return;
        }
        self.state = EnvelopeState::Attack;
        if compute_eg_rate(regs, keycode, EnvelopeState::Attack) >= 62 {
            self.attenuation = 0;
        }
    }

    /// Enter release on a key-off edge, unless already released.
    pub(crate) fn start_release(&mut self) {
        if self.state >= EnvelopeState::Release {
            return;
        }
        self.state = EnvelopeState::Release;
    }

    /// Advance the envelope by one EG tick at global count `env_counter`.
    pub(crate) fn clock(&mut self, regs: &OpRegs, keycode: u32, env_counter: u32) {
        // Attack->Decay the moment attenuation bottoms out, and
        // Decay->Sustain immediately after so a zero sustain level skips
        // the decay phase entirely within the same tick.
        if self.state == EnvelopeState::Attack && self.attenuation == 0 {
            self.state = EnvelopeState::Decay;
        }
        if self.state == EnvelopeState::Decay && u32::from(self.attenuation) >= sustain_level(regs)
        {
            self.state = EnvelopeState::Sustain;
        }

        let rate = u32::from(compute_eg_rate(regs, keycode, self.state));

        // Shift the counter so it becomes a 5.11 fixed point value for
        // this rate; only whole steps clock the envelope.
        let rate_shift = rate >> 2;
        let counter = env_counter.wrapping_shl(rate_shift);
        if counter & 0x7FF != 0 {
            return;
        }

        let relevant_bits = (counter >> rate_shift.max(11)) & 7;
        let increment = attenuation_increment(rate, relevant_bits) as i32;

        if self.state == EnvelopeState::Attack {
            // Rates 62/63 only act at key-on; they never increment here.
            if rate < 62 {
                let att = i32::from(self.attenuation);
                self.attenuation = (att + ((!att * increment) >> 4)) as u16;
            }
        } else {
            let att = u32::from(self.attenuation) + increment as u32;
            self.attenuation = att.min(0x3FF) as u16;
        }
    }
}

/// Sustain level shifted up to attenuation units; the 4-bit register
/// value 15 decodes as 31 (effectively 5 bits).
pub(crate) fn sustain_level(regs: &OpRegs) -> u32 {
    let mut sl = u32::from(regs.sustain_level());
    sl |= (sl + 1) & 0x10;
    sl << 5
}

/// Apply key-scale-rate to a raw doubled rate, ignoring scaling when the
/// raw rate is zero and saturating to 6 bits.
fn effective_rate(raw: u32, ksr: u32) -> u32 {
    if raw == 0 {
        0
    } else {
        (raw + ksr).min(63)
    }
}

/// 6-bit envelope rate for the given phase, including key scaling.
pub(crate) fn compute_eg_rate(regs: &OpRegs, keycode: u32, state: EnvelopeState) -> u8 {
    let ksr = keycode >> (u32::from(regs.key_scale_rate()) ^ 3);
    let raw = match state {
        EnvelopeState::Attack => u32::from(regs.attack_rate()) * 2,
        EnvelopeState::Decay => u32::from(regs.decay_rate()) * 2,
        EnvelopeState::Sustain => u32::from(regs.sustain_rate()) * 2,
        EnvelopeState::Release => {
            let rr = u32::from(regs.release_rate());
            if rr != 0 {
                rr * 4 + 2
            } else {
                0
            }
        }
    };
    effective_rate(raw, ksr) as u8
}

// Per-rate sub-cycle increment patterns, 8 nibbles per rate. For attack
// the nibble is a fractional scale factor rather than a direct step.
#[rustfmt::skip]
const INCREMENT_TABLE: [u32; 64] = [
    0x0000_0000, 0x0000_0000, 0x1010_1010, 0x1010_1010, // 0-3
    0x1010_1010, 0x1010_1010, 0x1110_1110, 0x1110_1110, // 4-7
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 8-11
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 12-15
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 16-19
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 20-23
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 24-27
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 28-31
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 32-35
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 36-39
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 40-43
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 44-47
    0x1111_1111, 0x2111_2111, 0x2121_2121, 0x2221_2221, // 48-51
    0x2222_2222, 0x4222_4222, 0x4242_4242, 0x4442_4442, // 52-55
    0x4444_4444, 0x8444_8444, 0x8484_8484, 0x8884_8884, // 56-59
    0x8888_8888, 0x8888_8888, 0x8888_8888, 0x8888_8888, // 60-63
];

/// 4-bit attenuation increment for a 6-bit rate and 3-bit step index.
fn attenuation_increment(rate: u32, index: u32) -> u32 {
    (INCREMENT_TABLE[(rate & 63) as usize] >> (4 * index)) & 0xF
}

/// Decode a 16-bit frequency into (keycode, block, fnum 4 MSBs) via the
/// position of the leading one. Frequencies below 0x100 decode to zero.
pub(crate) fn freq16_decode(freq16: u16) -> (u32, u32, u32) {
    if freq16 < 0x0100 {
        return (0, 0, 0);
    }
    let msb = 31 - u32::from(freq16).leading_zeros(); // 8..15
    let block = msb - 8; // 0..7
    let mant2 = (u32::from(freq16) >> (msb - 2)) & 3;
    let keycode = (block << 2) | mant2; // 0..31
    let fnum_4msb = (u32::from(freq16) >> (msb - 4)) & 0x0F;
    (keycode, block, fnum_4msb)
}

// Maximal attenuation offsets (block 7) for the top 4 fnum bits, in
// 0.75 dB units; lower blocks subtract 8 per block.
const FNUM_TO_ATTEN: [u8; 16] = [0, 24, 32, 37, 40, 43, 45, 47, 48, 50, 51, 52, 53, 54, 55, 56];

/// Key-scale-level attenuation offset for a block/fnum pair (6 dB per
/// octave curve, clamped at zero).
pub(crate) fn key_scale_atten(block: u32, fnum_4msb: u32) -> u32 {
    let result = i32::from(FNUM_TO_ATTEN[(fnum_4msb & 0xF) as usize]) - 8 * (block ^ 7) as i32;
    result.max(0) as u32
}
