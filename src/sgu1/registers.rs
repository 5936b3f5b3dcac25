//! SGU-1 register bank and field accessors.
//!
//! The register bank is flat byte storage: 9 channels of 64 bytes each,
//! addressed as `channel * 64 + offset`. Offsets 0..31 hold the four
//! operators (8 bytes each), offsets 32..63 the channel block. The bank
//! is the single source of truth for configuration, and a handful of
//! fields (PCM position, swept frequency/volume/cutoff) are also written
//! back by the engine each sample.
//!
//! Bit-packed fields are decoded by explicit accessor methods rather than
//! any bitfield construct, so the layout round-trips byte-for-byte.

use bitflags::bitflags;

use super::constants::{ch_reg, CHANNELS, OP_REGS, REGISTER_SPACE, REGS_PER_CHANNEL};

bitflags! {
    /// Channel control register (offset 0x24).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelCtrl: u8 {
        /// Envelope gate; edges drive key-on/key-off for all four operators.
        const GATE = 0x01;
        /// PCM playback mode (replaces the operator pipeline).
        const PCM = 0x08;
        /// Inter-channel ring modulation (multiply by next channel's raw output).
        const RING_MOD = 0x10;
        /// Mix the filter's low-pass output.
        const FILTER_LOW = 0x20;
        /// Mix the filter's high-pass output.
        const FILTER_HIGH = 0x40;
        /// Mix the filter's band-pass output.
        const FILTER_BAND = 0x80;
    }
}

bitflags! {
    /// Channel mode register (offset 0x25).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelMode: u8 {
        /// One-shot phase reset request; cleared by the engine once handled.
        const PHASE_RESET = 0x01;
        /// One-shot filter state reset request; cleared by the engine.
        const FILTER_PHASE_RESET = 0x02;
        /// Loop PCM playback back to the restart pointer at the boundary.
        const PCM_LOOP = 0x04;
        /// Enable the periodic phase-reset timer.
        const TIMER_SYNC = 0x08;
        /// Enable the frequency sweep engine.
        const FREQ_SWEEP = 0x10;
        /// Enable the volume sweep engine.
        const VOL_SWEEP = 0x20;
        /// Enable the cutoff sweep engine.
        const CUT_SWEEP = 0x40;
    }
}

impl ChannelCtrl {
    /// True when any filter output is selected.
    pub fn filter_enabled(self) -> bool {
        self.intersects(Self::FILTER_LOW | Self::FILTER_HIGH | Self::FILTER_BAND)
    }
}

/// Operator waveform selector (operator register 7, bits 2:0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// Table-lookup sine with skew/rectify modifiers.
    Sine = 0,
    /// Triangle with the same modifiers as sine.
    Triangle = 1,
    /// Sawtooth with polarity/quantize options and edge smoothing.
    Sawtooth = 2,
    /// Pulse with channel-shared or per-operator duty.
    Pulse = 3,
    /// Free-running 32-bit LFSR white noise.
    Noise = 4,
    /// Pitched 6-bit LFSR noise (fundamental tracks operator frequency).
    PeriodicNoise = 5,
    /// Reserved; outputs silence.
    Reserved6 = 6,
    /// 1024-byte PCM window used as the operator waveform.
    Sample = 7,
}

impl Waveform {
    /// Decode from the 3-bit register field.
    pub fn from_value(value: u8) -> Self {
        match value & 0x07 {
            0 => Waveform::Sine,
            1 => Waveform::Triangle,
            2 => Waveform::Sawtooth,
            3 => Waveform::Pulse,
            4 => Waveform::Noise,
            5 => Waveform::PeriodicNoise,
            6 => Waveform::Reserved6,
            _ => Waveform::Sample,
        }
    }

    /// True for the two LFSR noise waveforms.
    pub fn is_noise(self) -> bool {
        matches!(self, Waveform::Noise | Waveform::PeriodicNoise)
    }
}

/// Wave-parameter modifier codes for sine/triangle/sawtooth (WPAR < 8).
pub(crate) const WPAR_HALF_L: u8 = 1;
pub(crate) const WPAR_HALF_H: u8 = 2;
pub(crate) const WPAR_ABS_L: u8 = 3;
pub(crate) const WPAR_ABS_H: u8 = 4;
/// WPAR bit 3: quantize table lookups by zeroing low phase bits.
pub(crate) const WPAR_QUANT: u8 = 1 << 3;

/// One operator's eight register bytes, copied out of the bank.
///
/// Copying mirrors how the hardware latches a register snapshot per
/// evaluation and keeps borrow lifetimes out of the hot loop.
#[derive(Debug, Clone, Copy)]
pub struct OpRegs(pub(crate) [u8; OP_REGS]);

impl OpRegs {
    // R0: [7]TRM [6]VIB [5:4]KSR [3:0]MUL
    /// Tremolo (amplitude LFO) enable.
    pub fn tremolo(&self) -> bool {
        self.0[0] & 0x80 != 0
    }
    /// Vibrato (pitch LFO) enable.
    pub fn vibrato(&self) -> bool {
        self.0[0] & 0x40 != 0
    }
    /// 2-bit key-scale-rate strength.
    pub fn key_scale_rate(&self) -> u8 {
        (self.0[0] >> 4) & 0x03
    }
    /// 4-bit frequency multiplier (0 encodes x0.5).
    pub fn multiplier(&self) -> u8 {
        self.0[0] & 0x0F
    }

    // R1: [7:6]KSL [5:0]TL_lo6
    /// 2-bit key-scale-level shift.
    pub fn key_scale_level(&self) -> u8 {
        (self.0[1] >> 6) & 0x03
    }
    /// 7-bit total level (low 6 bits here, MSB from R6 bit 0).
    pub fn total_level(&self) -> u8 {
        (self.0[1] & 0x3F) | ((self.0[6] & 0x01) << 6)
    }

    // R2: [7:4]AR_lo4 [3:0]DR_lo4, MSBs in R7
    /// 5-bit attack rate.
    pub fn attack_rate(&self) -> u8 {
        ((self.0[2] >> 4) & 0x0F) | ((self.0[7] >> 4) & 0x01) << 4
    }
    /// 5-bit decay rate.
    pub fn decay_rate(&self) -> u8 {
        (self.0[2] & 0x0F) | ((self.0[7] >> 3) & 0x01) << 4
    }

    // R3: [7:4]SL [3:0]RR
    /// 4-bit sustain level.
    pub fn sustain_level(&self) -> u8 {
        (self.0[3] >> 4) & 0x0F
    }
    /// 4-bit release rate.
    pub fn release_rate(&self) -> u8 {
        self.0[3] & 0x0F
    }

    // R4: [7:5]DT [4:0]SR
    /// 3-bit detune selector.
    pub fn detune(&self) -> u8 {
        (self.0[4] >> 5) & 0x07
    }
    /// 5-bit sustain rate.
    pub fn sustain_rate(&self) -> u8 {
        self.0[4] & 0x1F
    }

    // R5: [7:5]DELAY [4]FIX [3:0]WPAR
    /// 3-bit key-on delay exponent (delay = 256 << n samples when n > 0).
    pub fn delay(&self) -> u8 {
        (self.0[5] >> 5) & 0x07
    }
    /// Fixed-frequency mode flag.
    pub fn fixed_freq(&self) -> bool {
        self.0[5] & 0x10 != 0
    }
    /// 4-bit waveform shape parameter.
    pub fn wave_param(&self) -> u8 {
        self.0[5] & 0x0F
    }

    // R6: [7]TRMD [6]VIBD [5]SYNC [4]RING [3:1]MOD [0]TL_msb
    /// Full-depth tremolo flag.
    pub fn tremolo_depth(&self) -> bool {
        self.0[6] & 0x80 != 0
    }
    /// Full-depth vibrato flag.
    pub fn vibrato_depth(&self) -> bool {
        self.0[6] & 0x40 != 0
    }
    /// Hard sync to the previous operator's phase wrap.
    pub fn sync(&self) -> bool {
        self.0[6] & 0x20 != 0
    }
    /// Ring modulation against the previous operator's sign.
    pub fn ring(&self) -> bool {
        self.0[6] & 0x10 != 0
    }
    /// 3-bit phase-modulation depth (feedback depth for operator 0).
    pub fn mod_depth(&self) -> u8 {
        (self.0[6] >> 1) & 0x07
    }

    // R7: [7:5]OUT [4]AR_msb [3]DR_msb [2:0]WAVE
    /// 3-bit direct output mix level.
    pub fn out_level(&self) -> u8 {
        (self.0[7] >> 5) & 0x07
    }
    /// Waveform selector.
    pub fn waveform(&self) -> Waveform {
        Waveform::from_value(self.0[7])
    }
}

/// Sweep descriptor registers (speed, amount+flags, bound).
#[derive(Debug, Clone, Copy)]
pub struct SweepRegs {
    /// Countdown reload value in samples.
    pub speed: u16,
    /// Step magnitude plus direction/wrap/bounce bits.
    pub amount: u8,
    /// Limit value, compared coarsely against the swept parameter.
    pub bound: u8,
}

/// Flat register storage for the whole chip.
#[derive(Clone)]
pub struct RegisterBank {
    bytes: [[u8; REGS_PER_CHANNEL]; CHANNELS],
}

impl RegisterBank {
    /// Create a zeroed register bank.
    pub fn new() -> Self {
        RegisterBank {
            bytes: [[0; REGS_PER_CHANNEL]; CHANNELS],
        }
    }

    /// Decompose an address into (channel, offset), wrapping the channel
    /// index modulo the channel count.
    pub fn decode_addr(addr: u16) -> (usize, usize) {
        let addr = addr as usize;
        ((addr / REGS_PER_CHANNEL) % CHANNELS, addr % REGS_PER_CHANNEL)
    }

    /// Read the raw byte at `addr` (no side effects).
    pub fn read(&self, addr: u16) -> u8 {
        let (ch, off) = Self::decode_addr(addr);
        self.bytes[ch][off]
    }

    /// Write the raw byte at `addr`.
    pub fn write(&mut self, addr: u16, value: u8) {
        let (ch, off) = Self::decode_addr(addr);
        self.bytes[ch][off] = value;
    }

    /// Zero every register byte.
    pub fn clear(&mut self) {
        self.bytes = [[0; REGS_PER_CHANNEL]; CHANNELS];
    }

    fn ch(&self, ch: usize) -> &[u8; REGS_PER_CHANNEL] {
        &self.bytes[ch % CHANNELS]
    }

    fn ch_mut(&mut self, ch: usize) -> &mut [u8; REGS_PER_CHANNEL] {
        &mut self.bytes[ch % CHANNELS]
    }

    fn read16(&self, ch: usize, lo: usize) -> u16 {
        let b = self.ch(ch);
        u16::from_le_bytes([b[lo], b[lo + 1]])
    }

    fn write16(&mut self, ch: usize, lo: usize, value: u16) {
        let b = self.ch_mut(ch);
        let [l, h] = value.to_le_bytes();
        b[lo] = l;
        b[lo + 1] = h;
    }

    /// Snapshot one operator's eight register bytes.
    pub fn op_regs(&self, ch: usize, op: usize) -> OpRegs {
        let b = self.ch(ch);
        let base = (op % 4) * OP_REGS;
        let mut regs = [0u8; OP_REGS];
        regs.copy_from_slice(&b[base..base + OP_REGS]);
        OpRegs(regs)
    }

    /// Channel base frequency (16-bit).
    pub fn freq(&self, ch: usize) -> u16 {
        self.read16(ch, ch_reg::FREQ_L)
    }

    /// Update the channel frequency (used by the frequency sweep).
    pub fn set_freq(&mut self, ch: usize, value: u16) {
        self.write16(ch, ch_reg::FREQ_L, value);
    }

    /// Signed channel volume.
    pub fn vol(&self, ch: usize) -> i8 {
        self.ch(ch)[ch_reg::VOL] as i8
    }

    /// Update the channel volume (used by the volume sweep).
    pub fn set_vol(&mut self, ch: usize, value: i8) {
        self.ch_mut(ch)[ch_reg::VOL] = value as u8;
    }

    /// Raw pan byte (used directly as the pan table index).
    pub fn pan(&self, ch: usize) -> u8 {
        self.ch(ch)[ch_reg::PAN]
    }

    /// Decoded channel control flags.
    pub fn ctrl(&self, ch: usize) -> ChannelCtrl {
        ChannelCtrl::from_bits_truncate(self.ch(ch)[ch_reg::CTRL])
    }

    /// Decoded channel mode flags.
    pub fn mode(&self, ch: usize) -> ChannelMode {
        ChannelMode::from_bits_truncate(self.ch(ch)[ch_reg::MODE])
    }

    /// Clear mode flag bits (one-shot requests acknowledge themselves).
    pub fn clear_mode(&mut self, ch: usize, flags: ChannelMode) {
        self.ch_mut(ch)[ch_reg::MODE] &= !flags.bits();
    }

    /// Filter cutoff (16-bit).
    pub fn cutoff(&self, ch: usize) -> u16 {
        self.read16(ch, ch_reg::CUTOFF_L)
    }

    /// Update the filter cutoff (used by the cutoff sweep).
    pub fn set_cutoff(&mut self, ch: usize, value: u16) {
        self.write16(ch, ch_reg::CUTOFF_L, value);
    }

    /// Shared pulse duty byte.
    pub fn duty(&self, ch: usize) -> u8 {
        self.ch(ch)[ch_reg::DUTY]
    }

    /// Filter resonance byte.
    pub fn reson(&self, ch: usize) -> u8 {
        self.ch(ch)[ch_reg::RESON]
    }

    /// PCM playback position.
    pub fn pcm_pos(&self, ch: usize) -> u16 {
        self.read16(ch, ch_reg::PCM_POS_L)
    }

    /// Update the PCM playback position (advanced by the engine).
    pub fn set_pcm_pos(&mut self, ch: usize, value: u16) {
        self.write16(ch, ch_reg::PCM_POS_L, value);
    }

    /// PCM boundary (end) pointer.
    pub fn pcm_end(&self, ch: usize) -> u16 {
        self.read16(ch, ch_reg::PCM_END_L)
    }

    /// PCM loop restart pointer; also anchors the sample-as-waveform window.
    pub fn pcm_restart(&self, ch: usize) -> u16 {
        self.read16(ch, ch_reg::PCM_RST_L)
    }

    /// Frequency sweep descriptor.
    pub fn freq_sweep(&self, ch: usize) -> SweepRegs {
        SweepRegs {
            speed: self.read16(ch, ch_reg::SWFREQ_SPD_L),
            amount: self.ch(ch)[ch_reg::SWFREQ_AMT],
            bound: self.ch(ch)[ch_reg::SWFREQ_BND],
        }
    }

    /// Volume sweep descriptor.
    pub fn vol_sweep(&self, ch: usize) -> SweepRegs {
        SweepRegs {
            speed: self.read16(ch, ch_reg::SWVOL_SPD_L),
            amount: self.ch(ch)[ch_reg::SWVOL_AMT],
            bound: self.ch(ch)[ch_reg::SWVOL_BND],
        }
    }

    /// Update the volume sweep amount byte (bounce flips the direction bit).
    pub fn set_vol_sweep_amount(&mut self, ch: usize, value: u8) {
        self.ch_mut(ch)[ch_reg::SWVOL_AMT] = value;
    }

    /// Cutoff sweep descriptor.
    pub fn cut_sweep(&self, ch: usize) -> SweepRegs {
        SweepRegs {
            speed: self.read16(ch, ch_reg::SWCUT_SPD_L),
            amount: self.ch(ch)[ch_reg::SWCUT_AMT],
            bound: self.ch(ch)[ch_reg::SWCUT_BND],
        }
    }

    /// Periodic phase-reset timer period.
    pub fn reset_timer(&self, ch: usize) -> u16 {
        self.read16(ch, ch_reg::RESTIMER_L)
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RegisterBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterBank")
            .field("channels", &CHANNELS)
            .field("bytes_per_channel", &REGS_PER_CHANNEL)
            .finish_non_exhaustive()
    }
}

// Compile-time check that the register space is what the address decoder assumes.
const _: () = assert!(REGISTER_SPACE == 576);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_address() {
        let mut bank = RegisterBank::new();
        for addr in 0..REGISTER_SPACE as u16 {
            let value = (addr as u8) ^ 0x5A;
            bank.write(addr, value);
            assert_eq!(bank.read(addr), value, "address {addr:#05x}");
        }
    }

    #[test]
    fn test_address_wraps_channel_index() {
        let mut bank = RegisterBank::new();
        // One past the last channel wraps back to channel 0.
        bank.write((REGISTER_SPACE + 5) as u16, 0x42);
        assert_eq!(bank.read(5), 0x42);
    }

    #[test]
    fn test_op_reg_fields() {
        let mut bank = RegisterBank::new();
        let base = 2 * 64 + 8; // channel 2, operator 1
        bank.write(base, 0b1101_0111); // TRM, VIB on, KSR=1, MUL=7
        bank.write(base + 1, 0b10_011010); // KSL=2, TL_lo6=0x1A
        bank.write(base + 6, 0x01); // TL msb
        bank.write(base + 7, 0b101_11_010); // OUT=5, AR/DR msbs, WAVE=2
        bank.write(base + 2, 0x93); // AR_lo4=9, DR_lo4=3

        let op = bank.op_regs(2, 1);
        assert!(op.tremolo());
        assert!(op.vibrato());
        assert_eq!(op.key_scale_rate(), 1);
        assert_eq!(op.multiplier(), 7);
        assert_eq!(op.key_scale_level(), 2);
        assert_eq!(op.total_level(), 0x1A | 0x40);
        assert_eq!(op.attack_rate(), 9 | 0x10);
        assert_eq!(op.decay_rate(), 3 | 0x10);
        assert_eq!(op.out_level(), 5);
        assert_eq!(op.waveform(), Waveform::Sawtooth);
    }

    #[test]
    fn test_sixteen_bit_fields_are_little_endian() {
        let mut bank = RegisterBank::new();
        bank.write(32, 0xD6);
        bank.write(33, 0x1C);
        assert_eq!(bank.freq(0), 0x1CD6);

        bank.set_cutoff(4, 0xBEEF);
        assert_eq!(bank.read((4 * 64 + 0x26) as u16), 0xEF);
        assert_eq!(bank.read((4 * 64 + 0x27) as u16), 0xBE);
    }

    #[test]
    fn test_mode_flag_clear_preserves_other_bits() {
        let mut bank = RegisterBank::new();
        bank.write(37, 0b0111_0011);
        bank.clear_mode(0, ChannelMode::PHASE_RESET);
        assert_eq!(bank.read(37), 0b0111_0010);
    }

    #[test]
    fn test_waveform_decode() {
        assert_eq!(Waveform::from_value(0), Waveform::Sine);
        assert_eq!(Waveform::from_value(5), Waveform::PeriodicNoise);
        assert_eq!(Waveform::from_value(7), Waveform::Sample);
        assert_eq!(Waveform::from_value(8 + 3), Waveform::Pulse); // masked to 3 bits
        assert!(Waveform::from_value(4).is_noise());
    }
}
