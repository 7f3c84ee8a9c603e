//! Schroeder-style reverb network for baked assets.
//!
//! Design
//! - 4 parallel feedback combs → 2 series allpasses.
//! - Comb lengths are mutually non-integer (29.7, 37.1, 41.1, 43.7 ms) to
//!   avoid obvious ringing, and scale with `room`.
//! - `damping` pulls the comb feedback down (darker, shorter tail).
//!
//! Output is the fully wet signal; callers blend dry/wet themselves.

use crate::filters::{allpass, comb};

/// Base comb delays in milliseconds.
const COMB_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];

/// Post-diffusion allpass delays (ms) and coefficient.
const ALLPASS_MS: [f32; 2] = [5.0, 1.7];
const ALLPASS_G: f32 = 0.7;

/// Reverb parameters, both in [0, 1].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Reverb {
    pub room: f32,
    pub damping: f32,
}

impl Default for Reverb {
    fn default() -> Self {
        Self { room: 0.7, damping: 0.5 }
    }
}

impl Reverb {
    pub fn new(room: f32, damping: f32) -> Self {
        Self { room: room.clamp(0.0, 1.0), damping: damping.clamp(0.0, 1.0) }
    }

    /// Comb feedback after damping; always < 1 so the tail decays.
    pub fn feedback(&self) -> f32 {
        (0.8 + 0.15 * self.room) * (1.0 - 0.3 * self.damping)
    }

    /// Comb delays in ms for this room size.
    pub fn comb_delays_ms(&self) -> [f32; 4] {
        let scale = 0.8 + 0.4 * self.room;
        COMB_MS.map(|d| d * scale)
    }

    /// Wet-only reverb of a mono buffer.
    pub fn process(&self, input: &[f32], sr: f32) -> Vec<f32> {
        let fb = self.feedback();
        let mut sum = vec![0.0_f32; input.len()];
        for d in self.comb_delays_ms() {
            let c = comb(input, d, fb, 1.0, sr);
            for (s, x) in sum.iter_mut().zip(c.iter()) {
                *s += x * 0.25;
            }
        }
        ALLPASS_MS.iter().fold(sum, |acc, &d| allpass(&acc, d, ALLPASS_G, sr))
    }
}

/// Shorthand for `Reverb::new(room, damping).process(input, sr)`.
pub fn reverb(input: &[f32], room: f32, damping: f32, sr: f32) -> Vec<f32> {
    Reverb::new(room, damping).process(input, sr)
}
