//! Filters: a TPT state-variable filter, a one-pole smoother and the
//! single-tap comb/allpass building blocks used by the reverb.
//!
//! Contents
//! - `SvfMode`    : LP/BP/HP taps of the SVF
//! - `SvfTpt`     : streaming State-Variable Filter via Topology Preserving Transform
//! - `svf`        : whole-buffer SVF pass
//! - `svf_multi`  : N cascaded passes for steeper roll-off
//! - `OnePoleLp`  : `y += a * (x - y)` smoother
//! - `comb`       : feedback comb with dry/wet
//! - `allpass`    : Schroeder allpass
//!
//! Notes
//! - `SvfTpt` uses `g = tan(π fc / sr)`, `k = 1/Q` and solves the zero-delay
//!   feedback loop exactly (a1 = 1/(1 + g(g + k))). Robust under modulation.

use crate::dsp::{kill_denormals, one_pole_coeff_hz, tpt_g};
use core::fmt::Debug;

/// SVF output tap selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SvfMode {
    Lowpass,
    Bandpass,
    Highpass,
}

/// Topology-Preserving Transform SVF (State-Variable Filter).
///
/// Parameters:
/// - `cut_hz`  : cutoff / center frequency in Hz (clamped below Nyquist)
/// - `q`       : resonance; 0.5 is critically damped, 0.707 Butterworth
#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    sr: f32,
    cut: f32,
    q: f32,
    // derived
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    // states
    ic1eq: f32,
    ic2eq: f32,
}

impl SvfTpt {
    #[inline]
    pub fn new(cut_hz: f32, q: f32, sr: f32) -> Self {
        let mut s = Self {
            sr: sr.max(1.0),
            cut: cut_hz.max(0.0),
            q: q.max(1e-4),
            k: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        s.recalc();
        s
    }

    #[inline] pub fn set_sample_rate(&mut self, sr: f32) { self.sr = sr.max(1.0); self.recalc(); }
    #[inline] pub fn set_cutoff_hz(&mut self, cut_hz: f32) { self.cut = cut_hz.max(0.0); self.recalc(); }
    #[inline] pub fn set_q(&mut self, q: f32) { self.q = q.max(1e-4); self.recalc(); }

    /// Clear the integrator states.
    #[inline] pub fn reset(&mut self) { self.ic1eq = 0.0; self.ic2eq = 0.0; }

    #[inline]
    fn recalc(&mut self) {
        let g = tpt_g(self.cut, self.sr);
        self.k = 1.0 / self.q;
        self.a1 = 1.0 / (1.0 + g * (g + self.k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    /// Process one sample, returning the `(lp, bp, hp)` taps.
    #[inline]
    pub fn process_all(&mut self, x: f32) -> (f32, f32, f32) {
        let v3 = x - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;
        self.ic1eq = kill_denormals(2.0 * v1 - self.ic1eq);
        self.ic2eq = kill_denormals(2.0 * v2 - self.ic2eq);

        let lp = v2;
        let bp = v1;
        let hp = x - self.k * v1 - v2;
        (lp, bp, hp)
    }

    /// Process one sample, returning only the mode requested.
    #[inline]
    pub fn process(&mut self, x: f32, mode: SvfMode) -> f32 {
        let (lp, bp, hp) = self.process_all(x);
        match mode {
            SvfMode::Lowpass => lp,
            SvfMode::Bandpass => bp,
            SvfMode::Highpass => hp,
        }
    }
}

/// One SVF pass over a whole buffer, fresh state.
pub fn svf(input: &[f32], cut_hz: f32, q: f32, mode: SvfMode, sr: f32) -> Vec<f32> {
    let mut f = SvfTpt::new(cut_hz, q, sr);
    input.iter().map(|&x| f.process(x, mode)).collect()
}

/// `passes` cascaded SVF passes with identical settings (12 dB/oct each for LP/HP).
pub fn svf_multi(input: &[f32], cut_hz: f32, q: f32, mode: SvfMode, passes: usize, sr: f32) -> Vec<f32> {
    let mut buf = input.to_vec();
    for _ in 0..passes {
        buf = svf(&buf, cut_hz, q, mode, sr);
    }
    buf
}

/// One-pole low-pass `y += a * (x - y)`.
///
/// `a` is either given directly (`from_alpha`) or derived from a cutoff:
/// `a = 1 - exp(-2π * fc / sr)`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleLp {
    a: f32,
    y: f32,
}

impl OnePoleLp {
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        Self { a: 1.0 - one_pole_coeff_hz(cut_hz, sr.max(1.0)), y: 0.0 }
    }

    #[inline]
    pub fn from_alpha(a: f32) -> Self {
        Self { a: a.clamp(0.0, 1.0), y: 0.0 }
    }

    /// Start from `y0` instead of silence.
    #[inline] pub fn reset(&mut self, y0: f32) { self.y = y0; }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += self.a * (x - self.y);
        kill_denormals(self.y)
    }

    #[inline] pub fn value(&self) -> f32 { self.y }
}

#[inline]
fn delay_len(delay_ms: f32, sr: f32) -> usize {
    ((delay_ms * sr / 1000.0).floor() as usize).max(1)
}

/// Single-tap feedback comb.
///
/// `out = x * (1 - wet) + d * wet`, the line is fed `x + d * feedback`.
pub fn comb(input: &[f32], delay_ms: f32, feedback: f32, wet: f32, sr: f32) -> Vec<f32> {
    let n = delay_len(delay_ms, sr);
    let mut line = vec![0.0_f32; n];
    let mut idx = 0;
    input
        .iter()
        .map(|&x| {
            let d = line[idx];
            line[idx] = kill_denormals(x + d * feedback);
            idx = (idx + 1) % n;
            x * (1.0 - wet) + d * wet
        })
        .collect()
}

/// Single-tap Schroeder allpass with coefficient `g`.
pub fn allpass(input: &[f32], delay_ms: f32, g: f32, sr: f32) -> Vec<f32> {
    let n = delay_len(delay_ms, sr);
    let mut line = vec![0.0_f32; n];
    let mut idx = 0;
    input
        .iter()
        .map(|&x| {
            let d = line[idx];
            let v = x - g * d;
            line[idx] = kill_denormals(v);
            idx = (idx + 1) % n;
            d + g * v
        })
        .collect()
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oscillators::sine;

    const SR: f32 = 48_000.0;

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn one_pole_lp_moves_towards_input() {
        let mut lp = OnePoleLp::new(1000.0, SR);
        let mut y = 0.0;
        for _ in 0..(SR as usize) {
            y = lp.process(1.0);
        }
        assert!(y > 0.9, "y={}", y);
    }

    #[test]
    fn svf_lowpass_passes_dc_and_blocks_highs() {
        let step = vec![1.0; SR as usize / 4];
        let lp = svf(&step, 500.0, 0.707, SvfMode::Lowpass, SR);
        assert!((lp[lp.len() - 1] - 1.0).abs() < 1e-3);

        let hi = sine(SR as usize / 4, 8_000.0, 1.0, 0.0, 0.0, 0.0, SR);
        let out = svf_multi(&hi, 300.0, 0.707, SvfMode::Lowpass, 2, SR);
        assert!(rms(&out[2000..]) < 0.01 * rms(&hi));
    }

    #[test]
    fn svf_highpass_blocks_dc() {
        let step = vec![1.0; SR as usize / 4];
        let hp = svf(&step, 200.0, 0.707, SvfMode::Highpass, SR);
        assert!(hp[hp.len() - 1].abs() < 1e-3);
    }

    #[test]
    fn cascading_steepens_rolloff() {
        let tone = sine(SR as usize / 4, 2_000.0, 1.0, 0.0, 0.0, 0.0, SR);
        let one = svf(&tone, 500.0, 0.707, SvfMode::Lowpass, SR);
        let three = svf_multi(&tone, 500.0, 0.707, SvfMode::Lowpass, 3, SR);
        assert!(rms(&three[4000..]) < rms(&one[4000..]));
    }

    #[test]
    fn comb_echoes_after_delay() {
        let mut imp = vec![0.0; 200];
        imp[0] = 1.0;
        let out = comb(&imp, 1.0, 0.5, 1.0, 48_000.0);
        // 1 ms at 48 kHz = 48 samples
        assert_eq!(out[0], 0.0);
        assert!((out[48] - 1.0).abs() < 1e-6);
        assert!((out[96] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn allpass_preserves_energy_roughly() {
        let mut imp = vec![0.0; 48_000];
        imp[0] = 1.0;
        let out = allpass(&imp, 5.0, 0.7, 48_000.0);
        let e: f32 = out.iter().map(|v| v * v).sum();
        assert!((e - 1.0).abs() < 1e-3, "energy={e}");
    }
}
