//! Scalar dead-zone quantization with per-subband step sizes.

use crate::jpeg2000::image::SubbandKind;

/// Maps a user-visible quality (1..100) to a base step size. Higher quality
/// means a smaller step; the curve is exponential so the low end of the
/// scale (heavy compression) moves quickly while 90-100 stays close to 1.0.
pub fn base_step_for_quality(quality: u8) -> f32 {
    let q = quality.clamp(1, 100) as f32;
    let t = (100.0 - q) / 99.0;
    0.25 * 128f32.powf(t)
}

/// Per-subband step size. `level` is the decomposition level the subband
/// belongs to (0 = finest detail, `num_levels` = the deepest LL). HH gets an
/// extra `sqrt(2)` (it carries the least visually important energy); the
/// deepest LL gets a finer step since errors there are not masked by detail
/// subbands at any coarser scale.
pub fn step_size(level: u8, num_levels: u8, kind: SubbandKind, base_step: f32, lossless: bool) -> f32 {
    if lossless {
        return 1.0;
    }
    let mut step = base_step * 2f32.powi(level as i32);
    if kind == SubbandKind::Hh {
        step *= std::f32::consts::SQRT_2;
    }
    if kind == SubbandKind::Ll && level == num_levels {
        step *= 0.5;
    }
    step.max(1e-6)
}

/// Quantizes one coefficient into a non-negative magnitude and a sign bit.
pub fn quantize(value: f32, step: f32) -> (u32, bool) {
    let neg = value < 0.0;
    let mag = (value.abs() / step).floor() as u32;
    (mag, neg)
}

/// Reconstructs a coefficient from its quantized magnitude and sign.
///
/// Lossless subbands (`step == 1.0` by construction, see [`step_size`]) skip
/// the usual midpoint offset: the 5/3 transform already produced an exact
/// integer, and adding 0.5 there would introduce a bias the inverse DWT
/// could never cancel, breaking the exact round-trip the lossless path
/// promises. Lossy subbands use the textbook midpoint reconstruction.
pub fn dequantize(mag: u32, neg: bool, step: f32) -> f32 {
    let v = if step == 1.0 {
        mag as f32
    } else {
        (mag as f32 + 0.5) * step
    };
    if neg {
        -v
    } else {
        v
    }
}

/// Serializes a step size as `(1 + mantissa/2048) * 2^-exponent`, the QCD
/// wire format (5-bit exponent, 11-bit mantissa packed into one u16).
pub fn encode_step(step: f32) -> u16 {
    if step <= 0.0 {
        return 0;
    }
    let mut exponent = 0i32;
    let mut mantissa_base = step;
    // Find exponent such that 1.0 <= step * 2^exponent < 2.0
    while mantissa_base >= 2.0 {
        mantissa_base /= 2.0;
        exponent -= 1;
    }
    while mantissa_base < 1.0 {
        mantissa_base *= 2.0;
        exponent += 1;
    }
    let exponent = exponent.clamp(0, 31) as u16;
    let mantissa = (((mantissa_base - 1.0) * 2048.0).round() as u16).min(2047);
    (exponent << 11) | mantissa
}

pub fn decode_step(encoded: u16) -> f32 {
    let exponent = (encoded >> 11) & 0x1F;
    let mantissa = encoded & 0x7FF;
    (1.0 + mantissa as f32 / 2048.0) * 2f32.powi(-(exponent as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_dequantize_lossy_midpoint() {
        let step = 4.0;
        let (mag, neg) = quantize(-13.5, step);
        assert_eq!(mag, 3);
        assert!(neg);
        let recon = dequantize(mag, neg, step);
        assert!((recon - (-14.0)).abs() < 1e-6);
    }

    #[test]
    fn quantize_dequantize_lossless_identity() {
        let (mag, neg) = quantize(-42.0, 1.0);
        assert_eq!(mag, 42);
        assert!(neg);
        assert_eq!(dequantize(mag, neg, 1.0), -42.0);
    }

    #[test]
    fn step_size_round_trip_through_wire_format() {
        for &step in &[1.0f32, 0.5, 2.0, 3.3, 0.01] {
            let encoded = encode_step(step);
            let decoded = decode_step(encoded);
            assert!((decoded - step).abs() / step < 0.01, "{step} -> {decoded}");
        }
    }

    #[test]
    fn quality_maps_monotonically_to_smaller_step() {
        let steps: Vec<f32> = (1..=100).step_by(10).map(base_step_for_quality).collect();
        for pair in steps.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }
}
