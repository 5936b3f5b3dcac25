//! SGU-1 Sound Generator Unit emulator
//!
//! A sample-accurate emulator of the SGU-1, a hybrid 9-channel sound
//! chip combining 4-operator FM synthesis with subtractive (SID-style)
//! processing: per-channel resonant filters, hardware parameter sweeps,
//! ring modulation, hard sync, and 64 KiB of 8-bit PCM memory.
//!
//! # Features
//! - 9 channels x 4 operators with 8 waveforms each (sine, triangle,
//!   sawtooth, pulse, two noise flavors, PCM window)
//! - ADSR envelopes with key scaling, onset delay, tremolo and vibrato
//! - Per-channel resonant state-variable filter (LP/HP/BP mix)
//! - Volume, frequency and cutoff sweeps with wrap/bounce modes
//! - Inter-channel ring modulation and operator hard sync
//! - PCM streaming playback and sample-as-waveform operators
//!
//! # Crate feature flags
//! - `export` (opt-in): offline WAV rendering (enables optional `hound` dep)
//!
//! # Quick start
//! ```
//! use sgu1::Sgu1;
//!
//! let mut chip = Sgu1::new();
//! chip.write(0x20, 0xD6); // channel 0 frequency, low byte
//! chip.write(0x21, 0x1C); // channel 0 frequency, high byte
//! chip.write(0x22, 0x7F); // channel 0 volume
//! chip.write(0x00, 0x01); // operator 0: MUL=1
//! chip.write(0x02, 0xF0); // operator 0: fast attack
//! chip.write(0x07, 0xE0); // operator 0: OUT=7, sine
//! chip.write(0x24, 0x01); // gate on
//! for _ in 0..48_000 {
//!     let (_l, _r) = chip.next_sample();
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod sgu1;

#[cfg(feature = "export")]
#[cfg_attr(docsrs, doc(cfg(feature = "export")))]
pub mod export;

pub use sgu1::{ChannelCtrl, ChannelMode, Sgu1, Waveform};

/// Error types for SGU-1 emulator operations.
///
/// The synthesis core itself is infallible; these errors cover the
/// host-facing surfaces such as audio export.
#[derive(thiserror::Error, Debug)]
pub enum Sgu1Error {
    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio export error
    #[error("Export error: {0}")]
    Export(String),
}

/// Convenience result alias for SGU-1 operations.
pub type Result<T> = std::result::Result<T, Sgu1Error>;
