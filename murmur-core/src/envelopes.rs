//! Envelope generators.
//!
//! Provided envelopes:
//! - `breakpoints` : piecewise-linear gain over ordered `(time, gain)` points
//! - `aperiodic`   : five summed sinusoids at irrationally related rates
//!
//! The aperiodic envelope is what keeps a looped asset from having an audible
//! seam: its component periods share no common multiple, so the composite
//! motion never repeats inside any realistic asset duration.

use crate::dsp::{m_sin64, TAU64};
use crate::rng::Mulberry32;

/// Golden ratio φ.
pub const PHI: f64 = 1.618_033_988_749_895;
pub const SQRT2: f64 = core::f64::consts::SQRT_2;
pub const SQRT3: f64 = 1.732_050_807_568_877_2;
pub const SQRT5: f64 = 2.236_067_977_499_79;

/// Rate multipliers of the five aperiodic components relative to the first.
pub const APERIODIC_RATIOS: [f64; 5] = [1.0, PHI, SQRT2, SQRT3 * 0.5, SQRT5 * 0.3];

/// Mixing weights of the five components (sum to 1).
pub const APERIODIC_WEIGHTS: [f64; 5] = [0.35, 0.25, 0.20, 0.12, 0.08];

/// Per-variant rate offset: variant `v` runs `1 + 0.07 v` times faster.
const VARIANT_RATE_STEP: f64 = 0.07;

/// A gain breakpoint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Breakpoint {
    pub time: f32,
    pub gain: f32,
}

impl Breakpoint {
    #[inline]
    pub const fn new(time: f32, gain: f32) -> Self {
        Self { time, gain }
    }
}

/// Piecewise-linear envelope over `n` frames.
///
/// Before the first point the first gain holds; after the last point the last
/// gain holds. Points must be ordered by time.
pub fn breakpoints(n: usize, points: &[Breakpoint], sr: f32) -> Vec<f32> {
    let Some(first) = points.first() else {
        return vec![1.0; n];
    };
    let mut out = Vec::with_capacity(n);
    let mut seg = 1;
    for i in 0..n {
        let t = i as f32 / sr;
        while seg < points.len() && t > points[seg].time {
            seg += 1;
        }
        let g = if t <= first.time {
            first.gain
        } else if seg >= points.len() {
            points[points.len() - 1].gain
        } else {
            let (a, b) = (points[seg - 1], points[seg]);
            let span = b.time - a.time;
            if span <= 0.0 {
                b.gain
            } else {
                a.gain + (b.gain - a.gain) * (t - a.time) / span
            }
        };
        out.push(g);
    }
    out
}

/// Parameters of one aperiodic modulation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aperiodic {
    /// Rate of the first component in Hz (0.03–0.3 for slow swells).
    pub base_rate: f32,
    /// Minimum output value.
    pub floor: f32,
    /// Output spans `[floor, floor + depth]`.
    pub depth: f32,
    /// Variant index; shifts all rates so sibling assets never phase-lock.
    pub variant: u32,
}

impl Aperiodic {
    pub const fn new(base_rate: f32, floor: f32, depth: f32, variant: u32) -> Self {
        Self { base_rate, floor, depth, variant }
    }

    /// The five component rates in Hz.
    pub fn rates(&self) -> [f64; 5] {
        let r1 = f64::from(self.base_rate) * (1.0 + f64::from(self.variant) * VARIANT_RATE_STEP);
        APERIODIC_RATIOS.map(|k| r1 * k)
    }

    /// Render `n` frames. Draws five phases from `rng`.
    pub fn render(&self, n: usize, rng: &mut Mulberry32, sr: f32) -> Vec<f32> {
        let rates = self.rates();
        let phases: [f64; 5] = core::array::from_fn(|_| rng.next_f64() * TAU64);
        let (floor, depth) = (f64::from(self.floor), f64::from(self.depth));
        let sr = f64::from(sr);
        (0..n)
            .map(|i| {
                let t = i as f64 / sr;
                let m: f64 = (0..5)
                    .map(|k| APERIODIC_WEIGHTS[k] * m_sin64(TAU64 * rates[k] * t + phases[k]))
                    .sum();
                (floor + depth * (0.5 + 0.5 * m)) as f32
            })
            .collect()
    }
}

/// Shorthand for `Aperiodic::new(..).render(..)`.
pub fn aperiodic(n: usize, base_rate: f32, floor: f32, depth: f32, variant: u32, rng: &mut Mulberry32, sr: f32) -> Vec<f32> {
    Aperiodic::new(base_rate, floor, depth, variant).render(n, rng, sr)
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints_interpolate_linearly() {
        let pts = [Breakpoint::new(0.0, 0.0), Breakpoint::new(1.0, 1.0), Breakpoint::new(2.0, 0.5)];
        let env = breakpoints(300, &pts, 100.0);
        assert!((env[50] - 0.5).abs() < 1e-6);
        assert!((env[100] - 1.0).abs() < 1e-6);
        assert!((env[150] - 0.75).abs() < 1e-6);
        assert!((env[299] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_breakpoints_are_unity() {
        assert!(breakpoints(10, &[], 100.0).iter().all(|&g| g == 1.0));
    }

    #[test]
    fn aperiodic_stays_within_floor_and_depth() {
        let mut rng = Mulberry32::new(11);
        let env = aperiodic(48_000 * 4, 0.5, 0.3, 0.5, 2, &mut rng, 48_000.0);
        assert!(env.iter().all(|&g| (0.3 - 1e-6..=0.8 + 1e-6).contains(&g)));
    }

    #[test]
    fn component_ratios_are_not_small_rationals() {
        let r = Aperiodic::new(0.07, 0.0, 1.0, 3).rates();
        for i in 0..5 {
            for j in (i + 1)..5 {
                let ratio = r[j] / r[i];
                for q in 1..=64_u32 {
                    let p = (ratio * f64::from(q)).round();
                    let err = (ratio - p / f64::from(q)).abs();
                    assert!(err > 1e-5, "components {i},{j}: ratio {ratio} ~ {p}/{q}");
                }
            }
        }
    }

    #[test]
    fn variants_shift_rates() {
        let a = Aperiodic::new(0.1, 0.0, 1.0, 0).rates();
        let b = Aperiodic::new(0.1, 0.0, 1.0, 1).rates();
        assert!((b[0] / a[0] - 1.07).abs() < 1e-12);
    }

    #[test]
    fn same_rng_same_envelope() {
        let a = aperiodic(1000, 0.2, 0.1, 0.4, 0, &mut Mulberry32::new(8), 1000.0);
        let b = aperiodic(1000, 0.2, 0.1, 0.4, 0, &mut Mulberry32::new(8), 1000.0);
        assert_eq!(a, b);
    }
}
