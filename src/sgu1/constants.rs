//! Chip-wide constants: clocks, geometry, and the channel register map.
//!
//! The SGU-1 exposes 64 register bytes per channel: four operators of
//! 8 bytes each (offsets 0..31), followed by 32 channel registers
//! (offsets 32..63). Multi-byte values are little-endian.

/// Pitch reference clock used by the phase-step math (1 MHz).
pub const CHIP_CLOCK: u32 = 1_000_000;

/// Nominal output sample rate (48 kHz).
pub const SAMPLE_RATE: u32 = 48_000;

/// Number of voice channels.
pub const CHANNELS: usize = 9;

/// Operators per channel.
pub const OPS_PER_CHANNEL: usize = 4;

/// Register bytes per operator.
pub const OP_REGS: usize = 8;

/// Channel-level register bytes per channel.
pub const CHANNEL_REGS: usize = 32;

/// Total register bytes per channel (4 operators + channel block).
pub const REGS_PER_CHANNEL: usize = OPS_PER_CHANNEL * OP_REGS + CHANNEL_REGS;

/// Size of the full register address space.
pub const REGISTER_SPACE: usize = CHANNELS * REGS_PER_CHANNEL;

/// PCM sample memory capacity (64 KiB of signed 8-bit samples).
pub const PCM_RAM_SIZE: usize = 0x10000;

/// Entries in each precomputed waveform table.
pub const WAVEFORM_LENGTH: usize = 0x400;

/// Maximum envelope attenuation (10-bit, roughly -60 dB).
pub const MAX_ATTENUATION: u16 = 0x3FF;

/// Attenuation above which an operator is treated as silent and skipped.
pub const QUIET_ATTENUATION: u16 = 0x380;

/// Envelope generator clock divider (EG runs at 48 kHz / 3 = 16 kHz).
pub const EG_CLOCK_DIVIDER: u32 = 3;

/// DC-blocking high-pass coefficient, 0.99869 in Q16.
pub const HPF_ALPHA_Q16: i64 = 65_450;

/// Channel register offsets within a channel's 64-byte block.
///
/// Offsets 0..31 are the four operator blocks; these names cover the
/// channel block at 32..63.
pub mod ch_reg {
    /// 16-bit base frequency, low byte.
    pub const FREQ_L: usize = 0x20;
    /// 16-bit base frequency, high byte.
    pub const FREQ_H: usize = 0x21;
    /// Signed channel volume; negative values invert phase.
    pub const VOL: usize = 0x22;
    /// Signed stereo pan (positive = right).
    pub const PAN: usize = 0x23;
    /// Control flags: gate, PCM enable, ring mod, filter mode selects.
    pub const CTRL: usize = 0x24;
    /// Mode flags: phase/filter resets, PCM loop, timer sync, sweep enables.
    pub const MODE: usize = 0x25;
    /// 16-bit filter cutoff, low byte.
    pub const CUTOFF_L: usize = 0x26;
    /// 16-bit filter cutoff, high byte.
    pub const CUTOFF_H: usize = 0x27;
    /// Shared pulse duty (7-bit).
    pub const DUTY: usize = 0x28;
    /// Filter resonance (0..255).
    pub const RESON: usize = 0x29;
    /// PCM playback position, low byte.
    pub const PCM_POS_L: usize = 0x2A;
    /// PCM playback position, high byte.
    pub const PCM_POS_H: usize = 0x2B;
    /// PCM boundary (end) pointer, low byte.
    pub const PCM_END_L: usize = 0x2C;
    /// PCM boundary (end) pointer, high byte.
    pub const PCM_END_H: usize = 0x2D;
    /// PCM loop restart pointer, low byte.
    pub const PCM_RST_L: usize = 0x2E;
    /// PCM loop restart pointer, high byte.
    pub const PCM_RST_H: usize = 0x2F;
    /// Frequency sweep speed, low byte.
    pub const SWFREQ_SPD_L: usize = 0x30;
    /// Frequency sweep speed, high byte.
    pub const SWFREQ_SPD_H: usize = 0x31;
    /// Frequency sweep amount + direction/mode bits.
    pub const SWFREQ_AMT: usize = 0x32;
    /// Frequency sweep bound.
    pub const SWFREQ_BND: usize = 0x33;
    /// Volume sweep speed, low byte.
    pub const SWVOL_SPD_L: usize = 0x34;
    /// Volume sweep speed, high byte.
    pub const SWVOL_SPD_H: usize = 0x35;
    /// Volume sweep amount + direction/wrap/bounce bits.
    pub const SWVOL_AMT: usize = 0x36;
    /// Volume sweep bound.
    pub const SWVOL_BND: usize = 0x37;
    /// Cutoff sweep speed, low byte.
    pub const SWCUT_SPD_L: usize = 0x38;
    /// Cutoff sweep speed, high byte.
    pub const SWCUT_SPD_H: usize = 0x39;
    /// Cutoff sweep amount + direction/mode bits.
    pub const SWCUT_AMT: usize = 0x3A;
    /// Cutoff sweep bound.
    pub const SWCUT_BND: usize = 0x3B;
    /// Periodic phase-reset timer period, low byte.
    pub const RESTIMER_L: usize = 0x3C;
    /// Periodic phase-reset timer period, high byte.
    pub const RESTIMER_H: usize = 0x3D;
    /// Implementation-reserved register.
    pub const SPECIAL1: usize = 0x3E;
    /// Implementation-reserved register.
    pub const SPECIAL2: usize = 0x3F;
}
