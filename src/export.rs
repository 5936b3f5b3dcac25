//! WAV file export functionality
//!
//! Offline rendering of chip output to 16-bit stereo WAV files. This is
//! a host-side convenience: it pulls samples from the chip like any
//! other consumer and involves no audio device.

use crate::{Result, Sgu1, Sgu1Error};
use std::path::Path;

use crate::sgu1::constants::SAMPLE_RATE;

/// Render `duration_secs` of chip output into a stereo WAV file.
///
/// The chip is advanced sample by sample from its current state; the
/// caller is expected to have programmed registers (and loaded PCM)
/// beforehand. The 32-bit mix is scaled down to 16 bits with clamping.
///
/// # Examples
///
/// ```no_run
/// use sgu1::Sgu1;
/// use sgu1::export::render_to_wav;
///
/// # fn main() -> sgu1::Result<()> {
/// let mut chip = Sgu1::new();
/// chip.write(0x21, 0x1C); // channel 0 frequency, high byte
/// chip.write(0x02, 0xF0); // operator 0: fast attack
/// chip.write(0x07, 0xE0); // operator 0: OUT=7, sine
/// chip.write(0x22, 0x7F); // full volume
/// chip.write(0x24, 0x01); // gate on
/// render_to_wav(&mut chip, "tone.wav", 2.0)?;
/// # Ok(())
/// # }
/// ```
pub fn render_to_wav<P: AsRef<Path>>(
    chip: &mut Sgu1,
    output_path: P,
    duration_secs: f64,
) -> Result<()> {
    let total_samples = (duration_secs * f64::from(SAMPLE_RATE)) as u64;

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(output_path.as_ref(), spec)
        .map_err(|e| Sgu1Error::Export(e.to_string()))?;

    for _ in 0..total_samples {
        let (l, r) = chip.next_sample();
        writer
            .write_sample(scale_to_i16(l))
            .map_err(|e| Sgu1Error::Export(e.to_string()))?;
        writer
            .write_sample(scale_to_i16(r))
            .map_err(|e| Sgu1Error::Export(e.to_string()))?;
    }

    writer
        .finalize()
        .map_err(|e| Sgu1Error::Export(e.to_string()))?;
    Ok(())
}

/// Scale the chip's mixed output to the 16-bit WAV range.
///
/// Nine channels at full scale can exceed a single channel's range, so
/// the mix is padded by 4 bits of headroom and clamped.
fn scale_to_i16(sample: i32) -> i16 {
    (sample >> 4).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}
