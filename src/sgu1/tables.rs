//! Precomputed lookup tables: waveforms, envelope gain, pan curves.
//!
//! All tables are built once on first use and shared by every chip
//! instance. The waveform tables are 1024 samples per period; the gain
//! table converts the 10-bit logarithmic attenuation into a linear Q13
//! gain using the OPN mantissa power table.

use std::sync::OnceLock;

use super::constants::WAVEFORM_LENGTH;

/// Shared read-only tables.
pub(crate) struct Tables {
    /// One period of sine, full i16 range.
    pub sine: [i16; WAVEFORM_LENGTH],
    /// One period of triangle, full i16 range.
    pub triangle: [i16; WAVEFORM_LENGTH],
    /// One rising period of sawtooth, full i16 range.
    pub sawtooth: [i16; WAVEFORM_LENGTH],
    /// Linear Q13 gain for each of the 1024 attenuation steps.
    pub env_gain: [u16; 0x400],
    /// Left pan gain (0..127) indexed by the raw pan byte.
    pub pan_l: [u8; 256],
    /// Right pan gain (0..127) indexed by the raw pan byte.
    pub pan_r: [u8; 256],
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Access the shared tables, building them on first call.
pub(crate) fn tables() -> &'static Tables {
    TABLES.get_or_init(build)
}

// 10-bit mantissas with an implied leading bit, matching the internal
// format of the OPN chip as extracted from the die. Indexed by the
// bit-inverted fractional attenuation, so entry 0 is the loudest step.
#[rustfmt::skip]
const POWER_MANTISSA: [u16; 256] = [
    0x3fa, 0x3f5, 0x3ef, 0x3ea, 0x3e4, 0x3df, 0x3da, 0x3d4,
    0x3cf, 0x3c9, 0x3c4, 0x3bf, 0x3b9, 0x3b4, 0x3ae, 0x3a9,
    0x3a4, 0x39f, 0x399, 0x394, 0x38f, 0x38a, 0x384, 0x37f,
    0x37a, 0x375, 0x370, 0x36a, 0x365, 0x360, 0x35b, 0x356,
    0x351, 0x34c, 0x347, 0x342, 0x33d, 0x338, 0x333, 0x32e,
    0x329, 0x324, 0x31f, 0x31a, 0x315, 0x310, 0x30b, 0x306,
    0x302, 0x2fd, 0x2f8, 0x2f3, 0x2ee, 0x2e9, 0x2e5, 0x2e0,
    0x2db, 0x2d6, 0x2d2, 0x2cd, 0x2c8, 0x2c4, 0x2bf, 0x2ba,
    0x2b5, 0x2b1, 0x2ac, 0x2a8, 0x2a3, 0x29e, 0x29a, 0x295,
    0x291, 0x28c, 0x288, 0x283, 0x27f, 0x27a, 0x276, 0x271,
    0x26d, 0x268, 0x264, 0x25f, 0x25b, 0x257, 0x252, 0x24e,
    0x249, 0x245, 0x241, 0x23c, 0x238, 0x234, 0x230, 0x22b,
    0x227, 0x223, 0x21e, 0x21a, 0x216, 0x212, 0x20e, 0x209,
    0x205, 0x201, 0x1fd, 0x1f9, 0x1f5, 0x1f0, 0x1ec, 0x1e8,
    0x1e4, 0x1e0, 0x1dc, 0x1d8, 0x1d4, 0x1d0, 0x1cc, 0x1c8,
    0x1c4, 0x1c0, 0x1bc, 0x1b8, 0x1b4, 0x1b0, 0x1ac, 0x1a8,
    0x1a4, 0x1a0, 0x19c, 0x199, 0x195, 0x191, 0x18d, 0x189,
    0x185, 0x181, 0x17e, 0x17a, 0x176, 0x172, 0x16f, 0x16b,
    0x167, 0x163, 0x160, 0x15c, 0x158, 0x154, 0x151, 0x14d,
    0x149, 0x146, 0x142, 0x13e, 0x13b, 0x137, 0x134, 0x130,
    0x12c, 0x129, 0x125, 0x122, 0x11e, 0x11b, 0x117, 0x114,
    0x110, 0x10c, 0x109, 0x106, 0x102, 0x0ff, 0x0fb, 0x0f8,
    0x0f4, 0x0f1, 0x0ed, 0x0ea, 0x0e7, 0x0e3, 0x0e0, 0x0dc,
    0x0d9, 0x0d6, 0x0d2, 0x0cf, 0x0cc, 0x0c8, 0x0c5, 0x0c2,
    0x0be, 0x0bb, 0x0b8, 0x0b5, 0x0b1, 0x0ae, 0x0ab, 0x0a8,
    0x0a4, 0x0a1, 0x09e, 0x09b, 0x098, 0x094, 0x091, 0x08e,
    0x08b, 0x088, 0x085, 0x082, 0x07e, 0x07b, 0x078, 0x075,
    0x072, 0x06f, 0x06c, 0x069, 0x066, 0x063, 0x060, 0x05d,
    0x05a, 0x057, 0x054, 0x051, 0x04e, 0x04b, 0x048, 0x045,
    0x042, 0x03f, 0x03c, 0x039, 0x036, 0x033, 0x030, 0x02d,
    0x02a, 0x028, 0x025, 0x022, 0x01f, 0x01c, 0x019, 0x016,
    0x014, 0x011, 0x00e, 0x00b, 0x008, 0x006, 0x003, 0x000,
];

/// Convert a 5.8 fixed point logarithmic attenuation into a linear
/// volume. The implicit 0x400 mantissa bit and a left shift by 2 are
/// folded in so the whole part reduces to a right shift.
pub(crate) fn attenuation_to_volume(input: u32) -> u32 {
    let mantissa = u32::from(POWER_MANTISSA[(input & 0xFF) as usize]);
    ((mantissa | 0x400) << 2) >> (input >> 8)
}

fn build() -> Tables {
    let mut t = Tables {
        sine: [0; WAVEFORM_LENGTH],
        triangle: [0; WAVEFORM_LENGTH],
        sawtooth: [0; WAVEFORM_LENGTH],
        env_gain: [0; 0x400],
        pan_l: [127; 256],
        pan_r: [127; 256],
    };

    for i in 0..WAVEFORM_LENGTH {
        let ramp = (i * u16::MAX as usize / (WAVEFORM_LENGTH - 1)) as u16;
        t.sawtooth[i] = (i32::from(i16::MIN) + i32::from(ramp)) as i16;
    }

    let half = WAVEFORM_LENGTH / 2;
    for i in 0..half {
        // Positive half mirrored and negated into the second half.
        let s = ((std::f64::consts::PI * i as f64 / (half - 1) as f64).sin()
            * f64::from(i16::MAX)) as i16;
        t.sine[i] = s;
        t.sine[i + half] = -s;
    }

    let quarter = WAVEFORM_LENGTH / 4;
    for i in 0..quarter {
        let s = (i * i16::MAX as usize / (quarter - 1)) as i16;
        t.triangle[i] = s;
        t.triangle[i + quarter] = i16::MAX - s;
        t.triangle[i + 2 * quarter] = -s;
        t.triangle[i + 3 * quarter] = i16::MIN + s;
    }

    for (i, gain) in t.env_gain.iter_mut().enumerate() {
        // Attenuation steps are 4.6; the table works in 4.8.
        *gain = attenuation_to_volume((i as u32) << 2) as u16;
    }

    // Pan byte 0 is hard right on the left curve's scale: left gain
    // ramps 127..0 over 0..127, right gain ramps over the upper half.
    for i in 0..128usize {
        t.pan_l[i] = (127 - i) as u8;
        t.pan_r[128 + i] = (i as u8).wrapping_sub(1);
    }
    t.pan_r[128] = 0;

    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sine_symmetry() {
        let t = tables();
        assert_eq!(t.sine[0], 0);
        // Peak lands between indices 255 and 256.
        assert!(t.sine[255] > 32_700 && t.sine[256] > 32_700);
        for i in 0..512 {
            assert_eq!(t.sine[i + 512], -t.sine[i], "index {i}");
        }
        // Quarter-period value close to sin(pi/4).
        assert_relative_eq!(
            f64::from(t.sine[256]) / 32767.0,
            (std::f64::consts::PI * 256.0 / 511.0).sin(),
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_triangle_quarters() {
        let t = tables();
        assert_eq!(t.triangle[0], 0);
        assert_eq!(t.triangle[255], i16::MAX);
        assert_eq!(t.triangle[256], i16::MAX);
        assert_eq!(t.triangle[512], 0);
        assert_eq!(t.triangle[768], i16::MIN);
    }

    #[test]
    fn test_sawtooth_ramp() {
        let t = tables();
        assert_eq!(t.sawtooth[0], i16::MIN);
        assert_eq!(t.sawtooth[1023], i16::MAX);
        for i in 1..WAVEFORM_LENGTH {
            assert!(t.sawtooth[i] >= t.sawtooth[i - 1]);
        }
    }

    #[test]
    fn test_gain_monotonically_decreasing() {
        let t = tables();
        assert_eq!(t.env_gain[0], attenuation_to_volume(0) as u16);
        for i in 1..0x400 {
            assert!(t.env_gain[i] <= t.env_gain[i - 1], "attenuation {i}");
        }
        // Bottom of the table is effectively silent.
        assert!(t.env_gain[0x3FF] < 8);
    }

    #[test]
    fn test_pan_curve_endpoints() {
        let t = tables();
        assert_eq!(t.pan_l[0], 127);
        assert_eq!(t.pan_r[0], 127);
        assert_eq!(t.pan_l[127], 0);
        assert_eq!(t.pan_r[128], 0);
        assert_eq!(t.pan_l[128], 127);
        assert_eq!(t.pan_r[255], 126);
        assert_eq!(t.pan_l[255], 127);
    }
}
