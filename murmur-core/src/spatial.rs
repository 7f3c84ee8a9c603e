//! Mono → stereo placement.

use crate::dsp::{m_sin64, TAU64};
use core::f32::consts::FRAC_PI_4;

/// Constant-power pan gains `(left, right)` for `pan` in [-1, 1].
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4; // [0, π/2]
    (angle.cos(), angle.sin())
}

/// Place a mono signal at a fixed pan. Output is interleaved stereo.
pub fn to_stereo(mono: &[f32], pan: f32) -> Vec<f32> {
    let (l, r) = pan_gains(pan);
    let mut out = Vec::with_capacity(mono.len() * 2);
    for &x in mono {
        out.push(x * l);
        out.push(x * r);
    }
    out
}

/// Place a mono signal with a pan that wanders sinusoidally around `base_pan`.
pub fn to_stereo_drift(mono: &[f32], base_pan: f32, drift_hz: f32, drift_amt: f32, sr: f32) -> Vec<f32> {
    let (hz, sr) = (f64::from(drift_hz), f64::from(sr));
    let mut out = Vec::with_capacity(mono.len() * 2);
    for (i, &x) in mono.iter().enumerate() {
        let wobble = m_sin64(TAU64 * hz * i as f64 / sr) as f32;
        let (l, r) = pan_gains(base_pan + drift_amt * wobble);
        out.push(x * l);
        out.push(x * r);
    }
    out
}

/// Interleave two independent mono channels.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    left.iter().zip(right.iter()).flat_map(|(&l, &r)| [l, r]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_power_across_the_field() {
        for p in [-1.0, -0.5, 0.0, 0.3, 1.0, 4.0] {
            let (l, r) = pan_gains(p);
            assert!((l * l + r * r - 1.0).abs() < 1e-6);
        }
        let (l, r) = pan_gains(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
    }

    #[test]
    fn drift_moves_the_image() {
        let mono = vec![1.0; 4000];
        let st = to_stereo_drift(&mono, 0.0, 1.0, 0.5, 4000.0);
        // quarter period: pan = +0.5 → right louder
        let (l, r) = (st[2 * 1000], st[2 * 1000 + 1]);
        assert!(r > l);
        // three quarters: pan = -0.5 → left louder
        let (l, r) = (st[2 * 3000], st[2 * 3000 + 1]);
        assert!(l > r);
    }

    #[test]
    fn interleave_alternates() {
        assert_eq!(interleave(&[1.0, 2.0], &[3.0, 4.0]), vec![1.0, 3.0, 2.0, 4.0]);
    }
}
