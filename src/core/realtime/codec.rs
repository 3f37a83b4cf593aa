//! G.711 μ-law (PCMU) companding for the voice track.
//!
//! The live transport negotiates PCMU only, so microphone samples are
//! downmixed, resampled to 8 kHz and companded in 20 ms frames, and remote
//! audio goes the opposite way.

use std::time::Duration;

/// PCMU clock rate.
pub const PCMU_SAMPLE_RATE: u32 = 8_000;

/// Samples in one 20 ms PCMU frame.
pub const FRAME_SAMPLES: usize = 160;

pub const FRAME_DURATION: Duration = Duration::from_millis(20);

const BIAS: i32 = 0x84;
const CLIP: i32 = 32_635;

/// Compand one linear 16-bit sample.
pub fn ulaw_encode(sample: i16) -> u8 {
    let mut magnitude = sample as i32;
    let sign = if magnitude < 0 {
        magnitude = -magnitude;
        0x80
    } else {
        0
    };
    magnitude = magnitude.min(CLIP) + BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && magnitude & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (magnitude >> (exponent + 3)) & 0x0F;

    !(sign | (exponent << 4) | mantissa) as u8
}

pub fn ulaw_decode(byte: u8) -> i16 {
    let byte = !byte as i32;
    let exponent = (byte >> 4) & 0x07;
    let mantissa = byte & 0x0F;
    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;

    if byte & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Compand a float sample in `[-1.0, 1.0]`; out-of-range input is clipped.
pub fn encode_f32(sample: f32) -> u8 {
    let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
    ulaw_encode(scaled)
}

pub fn decode_f32(byte: u8) -> f32 {
    ulaw_decode(byte) as f32 / i16::MAX as f32
}
