//! The SGU-1 chip: register interface and per-sample synthesis.
//!
//! `Sgu1` owns the register bank, nine channels, the global LFO and
//! envelope clocks, 64 KiB of PCM memory, and the output DC filter.
//! Hosts drive it with `write`/`read` and pull audio one stereo frame
//! at a time with `next_sample`. Every instance is fully independent.

use super::channel::{Channel, SampleClock};
use super::constants::{ch_reg, CHANNELS, EG_CLOCK_DIVIDER, PCM_RAM_SIZE, REGS_PER_CHANNEL};
use super::dc_filter::DcFilter;
use super::lfo::Lfo;
use super::registers::{ChannelCtrl, RegisterBank};

/// SGU-1 sound generator.
///
/// # Example
///
/// ```
/// use sgu1::Sgu1;
///
/// let mut chip = Sgu1::new();
/// chip.write(0x20, 0xD6); // channel 0 frequency, low byte
/// chip.write(0x21, 0x1C); // channel 0 frequency, high byte
/// chip.write(0x22, 0x7F); // channel 0 volume
/// chip.write(0x24, 0x01); // gate on
/// let (_l, _r) = chip.next_sample();
/// ```
pub struct Sgu1 {
    bank: RegisterBank,
    channels: [Channel; CHANNELS],
    lfo: Lfo,
    envelope_counter: u32,
    /// Raw channel outputs from the previous sample (ring-mod bus).
    ring_bus: [i16; CHANNELS],
    dc: DcFilter,
    pcm: Box<[i8; PCM_RAM_SIZE]>,
    muted: [bool; CHANNELS],
}

impl Sgu1 {
    /// Create a chip in its power-on state with zeroed PCM memory.
    pub fn new() -> Self {
        Sgu1 {
            bank: RegisterBank::new(),
            channels: std::array::from_fn(Channel::new),
            lfo: Lfo::new(),
            envelope_counter: 0,
            ring_bus: [0; CHANNELS],
            dc: DcFilter::new(),
            pcm: Box::new([0; PCM_RAM_SIZE]),
            muted: [false; CHANNELS],
        }
    }

    /// Write one register byte. Addresses wrap modulo the register
    /// space; writing a channel control byte applies gate edges
    /// immediately so the key change lands on the next sample.
    pub fn write(&mut self, addr: u16, value: u8) {
        let (ch, offset) = RegisterBank::decode_addr(addr);
        if offset == ch_reg::CTRL {
            let was_on = self.bank.ctrl(ch).contains(ChannelCtrl::GATE);
            let now_on = ChannelCtrl::from_bits_truncate(value).contains(ChannelCtrl::GATE);
            if was_on != now_on {
                self.channels[ch].gate_edge(now_on);
            }
        }
        self.bank.write(addr, value);
    }

    /// Read back one register byte. Engine-written fields (swept
    /// volume/frequency/cutoff, PCM position, acknowledged mode bits)
    /// reflect their current values.
    pub fn read(&self, addr: u16) -> u8 {
        self.bank.read(addr)
    }

    /// Generate one stereo sample.
    pub fn next_sample(&mut self) -> (i32, i32) {
        // Envelope counter with a 2-bit sub-counter; the divider skips
        // one sub-step so the EG ticks every third sample.
        self.envelope_counter = self.envelope_counter.wrapping_add(1);
        if self.envelope_counter & 3 == EG_CLOCK_DIVIDER {
            self.envelope_counter = self.envelope_counter.wrapping_add(4 - EG_CLOCK_DIVIDER);
        }

        let lfo_raw_pm = self.lfo.clock();
        let clock = SampleClock {
            lfo_raw_pm,
            lfo_am: self.lfo.am,
            env_tick: self.envelope_counter & 3 == 0,
            env_counter: self.envelope_counter >> 2,
        };

        let mut sum_l: i64 = 0;
        let mut sum_r: i64 = 0;

        for ch in 0..CHANNELS {
            // Ring modulation reads the next channel's raw output from
            // the previous sample.
            let ring_input = self.ring_bus[(ch + 1) % CHANNELS];
            let (l, r) = self.channels[ch].run(
                ch,
                &mut self.bank,
                &self.pcm,
                ring_input,
                &clock,
                self.muted[ch],
            );
            sum_l += i64::from(l);
            sum_r += i64::from(r);
        }

        for ch in 0..CHANNELS {
            self.ring_bus[ch] = self.channels[ch].raw;
        }

        self.dc.process(sum_l, sum_r)
    }

    /// Return the chip to its power-on state: registers, phases,
    /// envelopes, LFO, filters, and the output DC filter. PCM memory
    /// and host mute flags are left alone.
    pub fn reset(&mut self) {
        self.bank.clear();
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            channel.reset(ch);
        }
        self.lfo.reset();
        self.envelope_counter = 0;
        self.ring_bus = [0; CHANNELS];
        self.dc.reset();
    }

    /// Mute or unmute a channel on the host side. Muting removes the
    /// channel from the mix and clears its filter state; synthesis
    /// state keeps advancing so unmuting resumes in time.
    pub fn set_muted(&mut self, ch: usize, muted: bool) {
        self.muted[ch % CHANNELS] = muted;
    }

    /// Host-side mute flag for a channel.
    pub fn is_muted(&self, ch: usize) -> bool {
        self.muted[ch % CHANNELS]
    }

    /// Bulk-load signed 8-bit samples into PCM memory starting at
    /// `offset`; addresses wrap at the 64 KiB boundary.
    pub fn load_pcm(&mut self, offset: u16, data: &[i8]) {
        let mut addr = usize::from(offset);
        for &byte in data {
            self.pcm[addr & (PCM_RAM_SIZE - 1)] = byte;
            addr += 1;
        }
    }

    /// Post-processed mono output of one channel (after volume and
    /// filter, before pan), for meters and debugging.
    pub fn channel_output(&self, ch: usize) -> i32 {
        self.channels[ch % CHANNELS].post
    }
}

impl Default for Sgu1 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sgu1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sgu1")
            .field("envelope_counter", &self.envelope_counter)
            .field("muted", &self.muted)
            .finish_non_exhaustive()
    }
}

// The address space is dense: 9 channels of 64 bytes.
const _: () = assert!(CHANNELS * REGS_PER_CHANNEL == 576);

#[cfg(test)]
mod tests {
    use super::*;

    const CH0_FREQ_L: u16 = 0x20;
    const CH0_FREQ_H: u16 = 0x21;
    const CH0_VOL: u16 = 0x22;
    const CH0_CTRL: u16 = 0x24;

    fn setup_voice(chip: &mut Sgu1) {
        chip.write(CH0_FREQ_L, 0xD6);
        chip.write(CH0_FREQ_H, 0x1C);
        chip.write(CH0_VOL, 0x7F);
        // Operator 0: MUL=1, AR=8, OUT=7, sine.
        chip.write(0, 0x01);
        chip.write(2, 0x80);
        chip.write(7, 0xE0);
    }

    #[test]
    fn test_silent_until_gated() {
        let mut chip = Sgu1::new();
        setup_voice(&mut chip);
        for _ in 0..256 {
            let (l, r) = chip.next_sample();
            assert_eq!((l, r), (0, 0));
        }
    }

    #[test]
    fn test_gate_produces_output() {
        let mut chip = Sgu1::new();
        setup_voice(&mut chip);
        chip.write(CH0_CTRL, 0x01);
        let mut peak: i32 = 0;
        for _ in 0..48_000 {
            let (l, r) = chip.next_sample();
            peak = peak.max(l.abs()).max(r.abs());
        }
        assert!(peak > 1_000, "peak = {peak}");
    }

    #[test]
    fn test_release_decays_to_silence() {
        let mut chip = Sgu1::new();
        setup_voice(&mut chip);
        chip.write(3, 0x0F); // fast release
        chip.write(CH0_CTRL, 0x01);
        for _ in 0..24_000 {
            chip.next_sample();
        }
        chip.write(CH0_CTRL, 0x00);
        for _ in 0..96_000 {
            chip.next_sample();
        }
        let mut peak: i32 = 0;
        for _ in 0..4_800 {
            let (l, r) = chip.next_sample();
            peak = peak.max(l.abs()).max(r.abs());
        }
        assert!(peak < 16, "peak after release = {peak}");
    }

    #[test]
    fn test_phase_advances_monotonically() {
        let mut chip = Sgu1::new();
        setup_voice(&mut chip);
        chip.write(CH0_CTRL, 0x01);
        let mut last = 0u32;
        let mut wraps = 0;
        for _ in 0..10_000 {
            chip.next_sample();
            let phase = chip.channels[0].ops[0].phase;
            if phase < last {
                wraps += 1;
            } else {
                // step = (0x1CD6 * 16000 + 1) / 3, times MUL table / 2
                assert_eq!(phase - last, (0x1CD6 * 16_000 + 1) / 3);
            }
            last = phase;
        }
        assert!(wraps > 0);
    }

    #[test]
    fn test_hard_sync_resets_follower_phase() {
        let mut chip = Sgu1::new();
        // Operator 0 fast, operator 1 slow with SYNC, neither audible.
        chip.write(CH0_FREQ_H, 0x80);
        chip.write(0, 0x02); // op0 MUL=2
        chip.write(8, 0x01); // op1 MUL=1
        chip.write(8 + 6, 0x20); // op1 SYNC
        let mut saw_sync = false;
        let mut wrapped_last = false;
        for _ in 0..2_000 {
            chip.next_sample();
            if wrapped_last {
                // Operator 1 was reset this sample; the reset replaces
                // the phase advance entirely.
                assert_eq!(chip.channels[0].ops[1].phase, 0);
                saw_sync = true;
            }
            wrapped_last = chip.channels[0].ops[0].wrapped;
        }
        assert!(saw_sync);
    }

    #[test]
    fn test_vibrato_disabled_without_flag() {
        // Without VIB the phase step ignores the PM LFO entirely; two
        // chips clocked different amounts of LFO time agree.
        let mut chip = Sgu1::new();
        setup_voice(&mut chip);
        chip.write(CH0_CTRL, 0x01);
        let mut deltas = std::collections::BTreeSet::new();
        let mut last = 0u32;
        for i in 0..9_000 {
            chip.next_sample();
            let phase = chip.channels[0].ops[0].phase;
            if i > 0 && phase > last {
                deltas.insert(phase - last);
            }
            last = phase;
        }
        assert_eq!(deltas.len(), 1);
    }

    #[test]
    fn test_envelope_attenuation_stays_in_range() {
        let mut chip = Sgu1::new();
        setup_voice(&mut chip);
        chip.write(3, 0x37); // SL=3, RR=7
        chip.write(4, 0x0A); // SR=10
        chip.write(CH0_CTRL, 0x01);
        for i in 0..60_000 {
            if i == 30_000 {
                chip.write(CH0_CTRL, 0x00);
            }
            chip.next_sample();
            for op in &chip.channels[0].ops {
                assert!(op.env.attenuation <= 0x3FF);
            }
        }
    }

    #[test]
    fn test_envelope_counter_wraps_without_panic() {
        let mut chip = Sgu1::new();
        setup_voice(&mut chip);
        chip.write(CH0_CTRL, 0x01);
        chip.envelope_counter = u32::MAX - 4;
        for _ in 0..16 {
            chip.next_sample();
        }
    }

    #[test]
    fn test_mute_silences_but_keeps_running() {
        let mut chip = Sgu1::new();
        setup_voice(&mut chip);
        chip.write(CH0_CTRL, 0x01);
        chip.set_muted(0, true);
        assert!(chip.is_muted(0));
        let mut phase_moved = false;
        for _ in 0..4_800 {
            let (l, r) = chip.next_sample();
            assert_eq!((l, r), (0, 0));
            phase_moved |= chip.channels[0].ops[0].phase != 0;
        }
        assert!(phase_moved);
    }

    #[test]
    fn test_load_pcm_wraps_at_boundary() {
        let mut chip = Sgu1::new();
        chip.load_pcm(0xFFFF, &[11, 22, 33]);
        assert_eq!(chip.pcm[0xFFFF], 11);
        assert_eq!(chip.pcm[0], 22);
        assert_eq!(chip.pcm[1], 33);
    }

    #[test]
    fn test_reset_preserves_pcm_and_mutes() {
        let mut chip = Sgu1::new();
        chip.load_pcm(100, &[42]);
        chip.set_muted(3, true);
        chip.write(CH0_VOL, 0x40);
        chip.reset();
        assert_eq!(chip.read(CH0_VOL), 0);
        assert_eq!(chip.pcm[100], 42);
        assert!(chip.is_muted(3));
    }

    #[test]
    fn test_onset_delay_defers_attack() {
        let mut chip = Sgu1::new();
        setup_voice(&mut chip);
        chip.write(5, 0x20); // DELAY=1 => 512 samples
        chip.write(CH0_CTRL, 0x01);
        for _ in 0..512 {
            chip.next_sample();
            assert!(!chip.channels[0].ops[0].key_state);
        }
        chip.next_sample();
        assert!(chip.channels[0].ops[0].key_state);
    }
}
