//! Colored noise and sparse impulse generators.
//!
//! Every generator takes the random source explicitly; the same source state
//! always produces the same buffer.
//!
//! - `white`    : uniform in [-1, 1)
//! - `pink`     : ~-3 dB/oct, cascaded one-pole smoothers with staggered coefficients
//! - `brown`    : ~-6 dB/oct, leaky-integrated white noise, peak-normalized to 1
//! - `impulses` : sparse, bounded-random clicks (drops, crackle, clinks)

use crate::dsp::normalize;
use crate::filters::OnePoleLp;
use crate::rng::Mulberry32;

/// Step size and leak of the brown-noise integrator.
const BROWN_STEP: f32 = 0.02;
const BROWN_LEAK: f32 = 0.999;

/// Uniform white noise in [-1, 1).
pub fn white(n: usize, rng: &mut Mulberry32) -> Vec<f32> {
    (0..n).map(|_| rng.signed()).collect()
}

/// Pseudo-pink noise: `passes` cascaded one-poles with coefficients
/// 0.15, 0.25, 0.35, ... Each stage seeds from its first input sample.
pub fn pink(n: usize, rng: &mut Mulberry32, passes: usize) -> Vec<f32> {
    let mut buf = white(n, rng);
    for p in 0..passes {
        let Some(&first) = buf.first() else { break };
        let mut lp = OnePoleLp::from_alpha(0.15 + p as f32 * 0.1);
        lp.reset(first);
        buf = core::iter::once(first)
            .chain(buf[1..].iter().map(|&x| lp.process(x)))
            .collect();
    }
    buf
}

/// Brown noise: integrated white noise with a slight leak against DC drift,
/// then peak-normalized to 1.
pub fn brown(n: usize, rng: &mut Mulberry32) -> Vec<f32> {
    let w = white(n, rng);
    let mut acc = 0.0_f32;
    let mut out: Vec<f32> = w
        .iter()
        .map(|x| {
            acc += x * BROWN_STEP;
            acc *= BROWN_LEAK;
            acc
        })
        .collect();
    normalize(&mut out, 1.0);
    out
}

/// Sparse random impulses at `avg_rate` per second.
///
/// Gaps are uniform in [0.3, 1.7] × the mean gap, amplitudes in [0.3, 1.0]
/// with random polarity.
pub fn impulses(n: usize, avg_rate: f32, rng: &mut Mulberry32, sr: f32) -> Vec<f32> {
    let mut out = vec![0.0; n];
    if avg_rate <= 0.0 {
        return out;
    }
    let mean_gap = sr / avg_rate;
    let mut next = (rng.next_f32() * mean_gap) as usize;
    while next < n {
        let amp = 0.3 + rng.next_f32() * 0.7;
        out[next] = if rng.next_f32() > 0.5 { amp } else { -amp };
        next += ((mean_gap * (0.3 + rng.next_f32() * 1.4)) as usize).max(1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::peak;

    /// Mean absolute first difference relative to RMS: a crude spectral-tilt probe.
    fn roughness(x: &[f32]) -> f32 {
        let rms = (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt();
        let d = x.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f32>() / x.len() as f32;
        d / rms.max(1e-9)
    }

    #[test]
    fn white_is_bounded_and_deterministic() {
        let a = white(10_000, &mut Mulberry32::new(7));
        let b = white(10_000, &mut Mulberry32::new(7));
        assert_eq!(a, b);
        assert!(a.iter().all(|&x| (-1.0..1.0).contains(&x)));
    }

    #[test]
    fn spectra_get_darker_white_pink_brown() {
        let w = white(48_000, &mut Mulberry32::new(1));
        let p = pink(48_000, &mut Mulberry32::new(1), 3);
        let b = brown(48_000, &mut Mulberry32::new(1));
        assert!(roughness(&p) < roughness(&w));
        assert!(roughness(&b) < roughness(&p));
    }

    #[test]
    fn brown_is_peak_normalized() {
        let b = brown(20_000, &mut Mulberry32::new(99));
        assert!((peak(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn impulses_are_sparse_and_bounded() {
        let sr = 48_000.0;
        let imp = impulses(sr as usize * 10, 2.0, &mut Mulberry32::new(3), sr);
        let hits: Vec<f32> = imp.iter().copied().filter(|&x| x != 0.0).collect();
        assert!((8..=40).contains(&hits.len()), "hits={}", hits.len());
        assert!(hits.iter().all(|x| (0.3..=1.0).contains(&x.abs())));
    }
}
