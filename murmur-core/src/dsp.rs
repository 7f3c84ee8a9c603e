//! Generic DSP utilities, math backend and whole-buffer helpers.
//!
//! Design goals:
//! - One math backend selection point (`std` or `libm`), so asset builds can be
//!   made bit-reproducible across platforms by enabling the `libm` feature
//! - Optional `fast-math` approximations for realtime hot paths only
//! - Clean, side-effect free helpers that are easy to test
//!
//! Buffer conventions:
//! - Mono signals are plain `[f32]`, one sample per frame.
//! - Stereo signals are interleaved `[L, R, L, R, ...]`, `len == 2 * frames`.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    if #[cfg(feature = "libm")] {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { libm::cosf(x) }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] pub(crate) fn m_tanh(x: f32) -> f32 { libm::tanhf(x) }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { libm::tanf(x) }
        #[inline] pub(crate) fn m_sin64(x: f64) -> f64 { libm::sin(x) }
    } else {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] pub(crate) fn m_tanh(x: f32) -> f32 { x.tanh() }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { x.tan() }
        #[inline] pub(crate) fn m_sin64(x: f64) -> f64 { x.sin() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f32 = 2.0 * PI;

/// 2π in double precision, used by phase accumulators.
pub const TAU64: f64 = core::f64::consts::TAU;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    num_traits::clamp(x, lo, hi)
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

/// Number of whole frames in `secs` seconds at `sr`.
#[inline]
pub fn secs_to_frames(secs: f32, sr: f32) -> usize {
    (secs.max(0.0) * sr).floor() as usize
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    if db <= -120.0 { 0.0 } else { m_exp(0.11512925464970229_f32 * db) } // ln(10)/20
}

/// Convert linear gain to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin <= EPS_SMALL { -120.0 } else { 8.685889638065036553_f32 * lin.ln() } // 20/ln(10)
}

// --------------------------------- Nonlinearities --------------------------------

/// Soft clip via tanh. With `fast-math`, uses the rational
/// `tanh(x) ≈ x * (27 + x^2) / (27 + 9 x^2)`.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let x2 = x * x;
            x * (27.0 + x2) / (27.0 + 9.0 * x2)
        } else {
            m_tanh(x)
        }
    }
}

/// Drive + soft saturation helper: `tanh(drive * x)`.
#[inline]
pub fn saturate(x: f32, drive: f32) -> f32 {
    soft_clip(x * drive)
}

/// Whole-buffer saturation: `tanh(drive * x)` per sample.
pub fn saturate_buf(sig: &[f32], drive: f32) -> Vec<f32> {
    sig.iter().map(|&x| saturate(x, drive)).collect()
}

// --------------------------------- Coefficients ----------------------------------

/// Convert cutoff in Hz to a simple one-pole (non-TPT) coefficient `exp(-2π fc / sr)`.
#[inline]
pub fn one_pole_coeff_hz(cut_hz: f32, sr: f32) -> f32 {
    let fc = cut_hz.max(0.0).min(0.499 * sr);
    m_exp(-2.0 * PI * fc / sr)
}

/// TPT `g = tan(π fc / sr)`. Cutoff is kept just under Nyquist so `g` stays finite.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    let fc = cut_hz.max(0.0).min(0.499 * sr);
    let x = PI * (fc / sr);
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            m_sin(x) / m_cos(x)
        } else {
            m_tan(x)
        }
    }
}

// --------------------------------- Buffer ops ------------------------------------

/// In-place mix: `dst[i] += src[i] * gain`. Mismatched lengths mix the overlap.
#[inline]
pub fn mix_in_place(dst: &mut [f32], src: &[f32], gain: f32) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += *s * gain;
    }
}

/// Weighted sum of equal-length signals.
pub fn mix(signals: &[(&[f32], f32)]) -> Vec<f32> {
    let len = signals.iter().map(|(s, _)| s.len()).max().unwrap_or(0);
    let mut out = vec![0.0; len];
    for (sig, g) in signals {
        mix_in_place(&mut out, sig, *g);
    }
    out
}

/// Sample-by-sample product (ring mod / amplitude modulation).
pub fn multiply(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).collect()
}

/// Scaled copy.
pub fn gain(sig: &[f32], g: f32) -> Vec<f32> {
    sig.iter().map(|x| x * g).collect()
}

/// Maximum absolute sample value.
pub fn peak(sig: &[f32]) -> f32 {
    sig.iter().fold(0.0_f32, |p, x| p.max(x.abs()))
}

/// Scale so the peak equals `target`. Silent input is left untouched.
pub fn normalize(sig: &mut [f32], target: f32) {
    let p = peak(sig);
    if p > 0.0 {
        let s = target / p;
        for x in sig.iter_mut() {
            *x *= s;
        }
    }
}

/// Linear fade-in/out over an interleaved stereo buffer.
pub fn fade_stereo(stereo: &mut [f32], in_secs: f32, out_secs: f32, sr: f32) {
    let frames = stereo.len() / 2;
    let fi = secs_to_frames(in_secs, sr);
    let fo = secs_to_frames(out_secs, sr);
    for i in 0..frames {
        let mut e = 1.0;
        if fi > 0 && i < fi {
            e = i as f32 / fi as f32;
        }
        if fo > 0 && i > frames.saturating_sub(fo) {
            e = (frames - i) as f32 / fo as f32;
        }
        stereo[2 * i] *= e;
        stereo[2 * i + 1] *= e;
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn db_lin_roundtrip() {
        for db in [-60.0, -20.0, -6.0, 0.0, 6.0, 12.0] {
            let back = lin_to_db(db_to_lin(db));
            assert!((db - back).abs() < 0.1, "db={}, back={}", db, back);
        }
    }

    #[test]
    fn soft_clip_is_bounded() {
        for x in [-10.0, -2.0, -1.0, 0.0, 1.0, 2.0, 10.0] {
            let y = soft_clip(x);
            assert!(y <= 1.0 + 1e-4 && y >= -1.0 - 1e-4, "x={} y={}", x, y);
        }
    }

    #[test]
    fn clamp_respects_both_bounds() {
        assert_eq!(clamp(2.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
    }

    #[test]
    fn normalize_hits_target_peak() {
        let mut sig = vec![0.1, -0.4, 0.2, 0.05];
        normalize(&mut sig, 0.8);
        assert_relative_eq!(peak(&sig), 0.8, epsilon = 1e-6);
        assert_relative_eq!(sig[1], -0.8, epsilon = 1e-6);
    }

    #[test]
    fn normalize_leaves_silence_alone() {
        let mut sig = vec![0.0; 16];
        normalize(&mut sig, 0.8);
        assert!(sig.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn fade_starts_and_ends_at_zero() {
        let sr = 100.0;
        let mut st = vec![1.0; 2 * 200];
        fade_stereo(&mut st, 0.5, 0.5, sr);
        assert_eq!(st[0], 0.0);
        assert_eq!(st[1], 0.0);
        assert_relative_eq!(st[2 * 100], 1.0);
        assert!(st[2 * 199] < 0.05);
    }

    #[test]
    fn tpt_g_stays_finite_at_nyquist() {
        assert!(tpt_g(24_000.0, 48_000.0).is_finite());
        assert!(tpt_g(90_000.0, 48_000.0).is_finite());
    }
}
