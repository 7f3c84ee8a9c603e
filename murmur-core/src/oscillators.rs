//! Block oscillators: phase-continuous sine (optional FM), triangle, and a
//! polyBLEP band-limited sawtooth.
//!
//! Phase is accumulated in `f64` so long renders (minutes at 48 kHz) do not
//! drift audibly; output samples are `f32`.

use crate::dsp::{m_sin64, TAU64};

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wave { Sine, Tri, Saw }

/// Sine with phase-continuous FM.
///
/// Instantaneous frequency is `freq_hz + fm_depth * sin(2π fm_hz t)`; the phase
/// integrates it, so modulation never produces discontinuities.
pub fn sine(n: usize, freq_hz: f32, amp: f32, fm_hz: f32, fm_depth: f32, phase0: f32, sr: f32) -> Vec<f32> {
    let sr = f64::from(sr.max(1.0));
    let (f, fm_hz, fm_depth) = (f64::from(freq_hz), f64::from(fm_hz), f64::from(fm_depth));
    let mut phase = f64::from(phase0);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let fm = if fm_depth != 0.0 { fm_depth * m_sin64(TAU64 * fm_hz * i as f64 / sr) } else { 0.0 };
        out.push(amp * m_sin64(phase) as f32);
        phase += TAU64 * (f + fm) / sr;
        if phase > TAU64 * 1024.0 {
            phase %= TAU64;
        }
    }
    out
}

/// Naive triangle (already soft in spectrum; aliasing is negligible at ambient pitches).
pub fn triangle(n: usize, freq_hz: f32, amp: f32, sr: f32) -> Vec<f32> {
    let inc = f64::from(freq_hz) / f64::from(sr.max(1.0));
    let mut phase = 0.0_f64;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(amp * (4.0 * (phase - 0.5).abs() - 1.0) as f32);
        phase = (phase + inc) % 1.0;
    }
    out
}

/// Polynomial band-limited step residual at phase `t` for increment `dt`.
#[inline]
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let x = t / dt;
        x + x - x * x - 1.0
    } else if t > 1.0 - dt {
        let x = (t - 1.0) / dt;
        x * x + x + x + 1.0
    } else {
        0.0
    }
}

/// Sawtooth with polyBLEP correction at the wrap discontinuity.
pub fn saw(n: usize, freq_hz: f32, amp: f32, sr: f32) -> Vec<f32> {
    let inc = f64::from(freq_hz) / f64::from(sr.max(1.0));
    let mut phase = 0.0_f64;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let v = 2.0 * phase - 1.0 - poly_blep(phase, inc);
        out.push(amp * v as f32);
        phase = (phase + inc) % 1.0;
    }
    out
}

/// Dispatch by waveform (FM only applies to sine).
pub fn render(wave: Wave, n: usize, freq_hz: f32, amp: f32, sr: f32) -> Vec<f32> {
    match wave {
        Wave::Sine => sine(n, freq_hz, amp, 0.0, 0.0, 0.0, sr),
        Wave::Tri => triangle(n, freq_hz, amp, sr),
        Wave::Saw => saw(n, freq_hz, amp, sr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::peak;

    const SR: f32 = 48_000.0;

    fn zero_crossings(x: &[f32]) -> usize {
        x.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count()
    }

    #[test]
    fn sine_has_expected_frequency() {
        let s = sine(SR as usize, 100.0, 1.0, 0.0, 0.0, 0.0, SR);
        let zc = zero_crossings(&s);
        assert!((99..=101).contains(&zc), "zc={zc}");
        assert!(peak(&s) <= 1.0);
    }

    #[test]
    fn fm_is_phase_continuous() {
        let s = sine(SR as usize, 220.0, 1.0, 3.0, 40.0, 0.0, SR);
        // max per-sample step for a 260 Hz sine at 48 kHz is ~2π·260/48000
        let max_step = s.windows(2).map(|w| (w[1] - w[0]).abs()).fold(0.0, f32::max);
        assert!(max_step < 0.04, "step={max_step}");
    }

    #[test]
    fn triangle_and_saw_are_bounded() {
        let t = triangle(4800, 110.0, 0.5, SR);
        assert!(peak(&t) <= 0.5 + 1e-6);
        let s = saw(4800, 110.0, 1.0, SR);
        assert!(peak(&s) <= 1.0 + 1e-3);
    }

    #[test]
    fn blep_softens_the_wrap() {
        let inc = 440.0 / f64::from(SR);
        let naive_jump = 2.0;
        let s = saw(4800, 440.0, 1.0, SR);
        let max_step = s.windows(2).map(|w| (w[1] - w[0]).abs()).fold(0.0, f32::max);
        assert!(f64::from(max_step) < naive_jump - inc);
    }
}
