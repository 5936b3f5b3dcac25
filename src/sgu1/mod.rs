//! SGU-1 chip emulation core.
//!
//! The modules mirror the signal path: registers feed operators, whose
//! envelopes and phases produce waveforms; channels post-process with
//! ring modulation, volume, filter, pan and sweeps; the chip mixes the
//! nine channels and removes DC.

pub mod chip;
pub mod constants;
pub mod registers;

pub(crate) mod channel;
pub(crate) mod dc_filter;
pub(crate) mod envelope;
pub(crate) mod filter;
pub(crate) mod lfo;
pub(crate) mod operator;
pub(crate) mod tables;

pub use chip::Sgu1;
pub use registers::{ChannelCtrl, ChannelMode, Waveform};
