//! Mood profiles and their per-layer synthesizers.
//!
//! Every layer is: raw sources (oscillators, noise) → filters → an aperiodic
//! envelope at a rate no other layer uses → stereo placement → fade and peak
//! normalization. All slow modulation runs at irrational ratios (φ, √2, √3,
//! √5) of its base so the ten-second asset never has an audible loop point.
//!
//! Synthesis is a pure function of `(profile, layer, variant, rng state, spec)`.

use std::fmt;
use std::str::FromStr;

use murmur_core::dsp::{fade_stereo, gain, mix_in_place, multiply, normalize, saturate_buf};
use murmur_core::envelopes::{self, aperiodic};
use murmur_core::filters::SvfMode::{Bandpass as BP, Highpass as HP, Lowpass as LP};
use murmur_core::filters::{svf, svf_multi};
use murmur_core::noise::{brown, impulses, pink, white};
use murmur_core::oscillators::sine;
use murmur_core::reverb::reverb;
use murmur_core::rng::Mulberry32;
use murmur_core::spatial::{interleave, to_stereo_drift};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::manifest::{Category, Layer};

const PHI: f32 = envelopes::PHI as f32;
const SQRT2: f32 = envelopes::SQRT2 as f32;
const SQRT3: f32 = envelopes::SQRT3 as f32;
const SQRT5: f32 = envelopes::SQRT5 as f32;

/// Fade in and out applied to every asset.
pub const FADE_SECS: f32 = 0.8;

/// Output contract for one asset. Always 16-bit interleaved stereo.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct SynthSpec {
    pub sample_rate: u32,
    pub duration_secs: f32,
}

impl Default for SynthSpec {
    fn default() -> Self {
        Self { sample_rate: 48_000, duration_secs: 10.0 }
    }
}

impl SynthSpec {
    pub fn frames(&self) -> usize {
        (self.duration_secs.max(0.0) * self.sample_rate as f32).round() as usize
    }

    fn sr(&self) -> f32 {
        self.sample_rate.max(1) as f32
    }
}

/// Nominal per-layer metadata recorded in the manifest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerDef {
    pub layer: Layer,
    pub variants: u32,
    pub lufs: f64,
    pub brightness: f64,
    pub density: f64,
    pub movement: f64,
}

const fn def(layer: Layer, variants: u32, lufs: f64, brightness: f64, density: f64, movement: f64) -> LayerDef {
    LayerDef { layer, variants, lufs, brightness, density, movement }
}

#[rustfmt::skip]
const FOCUS_WARM: [LayerDef; 4] = [
    def(Layer::LowBed,     4, -32.0, 0.0,  1.0,   0.006),
    def(Layer::MidTexture, 5, -32.5, 0.0,  1.0,   0.018),
    def(Layer::Air,        3, -33.5, 0.95, 0.999, 0.055),
    def(Layer::Room,       3, -34.5, 0.0,  1.0,   0.004),
];

#[rustfmt::skip]
const NATURE_AIR: [LayerDef; 4] = [
    def(Layer::LowBed,     3, -32.5, 0.0,   1.0,   0.008),
    def(Layer::MidTexture, 5, -32.0, 0.0,   0.998, 0.025),
    def(Layer::Air,        4, -33.0, 0.998, 0.999, 0.08),
    def(Layer::Room,       2, -34.0, 0.0,   1.0,   0.005),
];

#[rustfmt::skip]
const RAIN_GENTLE: [LayerDef; 4] = [
    def(Layer::LowBed,     3, -32.0, 0.0,   1.0,   0.005),
    def(Layer::MidTexture, 5, -31.5, 0.0,   0.999, 0.035),
    def(Layer::Air,        3, -33.0, 0.997, 0.999, 0.075),
    def(Layer::Room,       3, -34.0, 0.0,   1.0,   0.008),
];

#[rustfmt::skip]
const DEEP_HUM: [LayerDef; 3] = [
    def(Layer::LowBed,     4, -31.0, 0.0,   1.0,   0.004),
    def(Layer::MidTexture, 4, -31.5, 0.0,   1.0,   0.012),
    def(Layer::Air,        3, -34.0, 0.998, 0.999, 0.04),
];

#[rustfmt::skip]
const CAFE_MURMUR: [LayerDef; 4] = [
    def(Layer::LowBed,     3, -32.0, 0.0,   1.0,   0.007),
    def(Layer::MidTexture, 5, -31.5, 0.0,   0.998, 0.04),
    def(Layer::Air,        3, -33.0, 0.996, 0.999, 0.065),
    def(Layer::Room,       3, -34.0, 0.0,   1.0,   0.006),
];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    FocusWarm,
    NatureAir,
    RainGentle,
    DeepHum,
    CafeMurmur,
}

impl Profile {
    pub const ALL: [Profile; 5] =
        [Profile::FocusWarm, Profile::NatureAir, Profile::RainGentle, Profile::DeepHum, Profile::CafeMurmur];

    pub fn name(self) -> &'static str {
        match self {
            Profile::FocusWarm => "focus_warm",
            Profile::NatureAir => "nature_air",
            Profile::RainGentle => "rain_gentle",
            Profile::DeepHum => "deep_hum",
            Profile::CafeMurmur => "cafe_murmur",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Profile::FocusWarm => Category::Focus,
            Profile::NatureAir => Category::Nature,
            Profile::RainGentle => Category::Rain,
            Profile::DeepHum => Category::Drone,
            Profile::CafeMurmur => Category::Cafe,
        }
    }

    pub fn layers(self) -> &'static [LayerDef] {
        match self {
            Profile::FocusWarm => &FOCUS_WARM,
            Profile::NatureAir => &NATURE_AIR,
            Profile::RainGentle => &RAIN_GENTLE,
            Profile::DeepHum => &DEEP_HUM,
            Profile::CafeMurmur => &CAFE_MURMUR,
        }
    }

    pub fn layer_def(self, layer: Layer) -> Option<&'static LayerDef> {
        self.layers().iter().find(|d| d.layer == layer)
    }

    /// `{profile}_{layer}_{variant:02}`, variant counted from 1.
    pub fn asset_id(self, layer: Layer, variant: u32) -> String {
        format!("{}_{}_{:02}", self.name(), layer, variant)
    }

    /// Manifest-relative path of an asset.
    pub fn asset_path(self, layer: Layer, variant: u32) -> String {
        format!("{}/{}/{}/{}_v1.wav", self.category(), self.name(), layer, self.asset_id(layer, variant))
    }

    /// Render one interleaved stereo asset. `variant` is zero-based here.
    /// `None` when the profile has no such layer.
    pub fn synthesize(self, layer: Layer, variant: u32, rng: &mut Mulberry32, spec: &SynthSpec) -> Option<Vec<f32>> {
        self.layer_def(layer)?;
        let s = Ctx { n: spec.frames(), sr: spec.sr(), v: variant, vf: variant as f32 };
        let out = match (self, layer) {
            (Profile::FocusWarm, Layer::LowBed) => focus_warm::low_bed(&s, rng),
            (Profile::FocusWarm, Layer::MidTexture) => focus_warm::mid_texture(&s, rng),
            (Profile::FocusWarm, Layer::Air) => focus_warm::air(&s, rng),
            (Profile::FocusWarm, Layer::Room) => focus_warm::room(&s, rng),
            (Profile::NatureAir, Layer::LowBed) => nature_air::low_bed(&s, rng),
            (Profile::NatureAir, Layer::MidTexture) => nature_air::mid_texture(&s, rng),
            (Profile::NatureAir, Layer::Air) => nature_air::air(&s, rng),
            (Profile::NatureAir, Layer::Room) => nature_air::room(&s, rng),
            (Profile::RainGentle, Layer::LowBed) => rain_gentle::low_bed(&s, rng),
            (Profile::RainGentle, Layer::MidTexture) => rain_gentle::mid_texture(&s, rng),
            (Profile::RainGentle, Layer::Air) => rain_gentle::air(&s, rng),
            (Profile::RainGentle, Layer::Room) => rain_gentle::room(&s, rng),
            (Profile::DeepHum, Layer::LowBed) => deep_hum::low_bed(&s, rng),
            (Profile::DeepHum, Layer::MidTexture) => deep_hum::mid_texture(&s, rng),
            (Profile::DeepHum, Layer::Air) => deep_hum::air(&s, rng),
            (Profile::DeepHum, Layer::Room) => return None,
            (Profile::CafeMurmur, Layer::LowBed) => cafe_murmur::low_bed(&s, rng),
            (Profile::CafeMurmur, Layer::MidTexture) => cafe_murmur::mid_texture(&s, rng),
            (Profile::CafeMurmur, Layer::Air) => cafe_murmur::air(&s, rng),
            (Profile::CafeMurmur, Layer::Room) => cafe_murmur::room(&s, rng),
        };
        Some(out)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| EngineError::UnknownProfile { name: s.to_string() })
    }
}

/// Per-render dimensions.
struct Ctx {
    n: usize,
    sr: f32,
    v: u32,
    vf: f32,
}

impl Ctx {
    fn tone(&self, freq: f32, amp: f32) -> Vec<f32> {
        sine(self.n, freq, amp, 0.0, 0.0, 0.0, self.sr)
    }

    fn fm(&self, freq: f32, amp: f32, fm_hz: f32, fm_depth: f32) -> Vec<f32> {
        sine(self.n, freq, amp, fm_hz, fm_depth, 0.0, self.sr)
    }

    fn env(&self, base: f32, floor: f32, depth: f32, variant: u32, rng: &mut Mulberry32) -> Vec<f32> {
        aperiodic(self.n, base, floor, depth, variant, rng, self.sr)
    }

    fn drift(&self, mono: &[f32], pan: f32, hz: f32, amt: f32) -> Vec<f32> {
        to_stereo_drift(mono, pan, hz, amt, self.sr)
    }

    /// Fade, then normalize the peak to `target`.
    fn finish(&self, mut stereo: Vec<f32>, target: f32) -> Vec<f32> {
        fade_stereo(&mut stereo, FADE_SECS, FADE_SECS, self.sr);
        normalize(&mut stereo, target);
        stereo
    }
}

fn blend(a: &[f32], ga: f32, b: &[f32], gb: f32) -> Vec<f32> {
    let mut out = gain(a, ga);
    mix_in_place(&mut out, b, gb);
    out
}

fn sum(parts: &[Vec<f32>]) -> Vec<f32> {
    let n = parts.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = vec![0.0; n];
    for p in parts {
        mix_in_place(&mut out, p, 1.0);
    }
    out
}

/// Singing-bowl partials, warm drone, long tails.
mod focus_warm {
    use super::*;

    pub(super) fn low_bed(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let f = 55.0 + s.vf * 3.0;
        let mixed = sum(&[
            s.fm(f, 0.5, 0.008 + s.vf * 0.002, 0.2),
            s.tone(f * 2.0012, 0.25), // near-octave beating
            s.tone(f * 2.92, 0.10),   // inharmonic bowl mode
            s.tone(f * 0.5, 0.35),
        ]);
        let filtered = svf_multi(&mixed, 180.0 + s.vf * 15.0, 0.6, LP, 3, s.sr);
        let warm = saturate_buf(&filtered, 1.3);
        let env = s.env(0.07, 0.65, 0.35, s.v, rng);
        let out = multiply(&warm, &env);
        s.finish(s.drift(&out, 0.0, 0.011 * PHI, 0.05), 0.65)
    }

    pub(super) fn mid_texture(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let f = 110.0 + s.vf * 12.0;
        let mut out = vec![0.0; s.n];
        for r in [1.0, 1.503, 2.71, 4.56] {
            let detune = (rng.next_f32() - 0.5) * 0.08;
            let amp = 0.18 / (r * 0.7);
            let fm_hz = 0.005 + rng.next_f32() * 0.008;
            let fm_depth = 0.15 * rng.next_f32();
            mix_in_place(&mut out, &s.fm(f * r + detune, amp, fm_hz, fm_depth), 1.0);
        }
        let lp = svf_multi(&out, 450.0 + s.vf * 30.0, 0.6, LP, 2, s.sr);
        let sat = saturate_buf(&lp, 1.15);
        let env = s.env(0.055, 0.5, 0.5, s.v + 3, rng);
        let modded = multiply(&sat, &env);
        s.finish(s.drift(&modded, (s.vf - 2.0) * 0.15, 0.023 * SQRT2, 0.12), 0.5)
    }

    pub(super) fn air(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let noise = white(s.n, rng);
        let hp = svf(&noise, 5000.0, 0.5, HP, s.sr);
        let lp = svf(&hp, 9500.0 + s.vf * 300.0, 0.4, LP, s.sr);
        let rev = reverb(&lp, 0.85, 0.65, s.sr);
        let mixed = blend(&lp, 0.2, &rev, 0.4);
        let env = s.env(0.04, 0.5, 0.4, s.v + 7, rng);
        let out = multiply(&mixed, &env);
        s.finish(s.drift(&out, 0.0, 0.037 * SQRT3, 0.18), 0.22)
    }

    pub(super) fn room(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let b = brown(s.n, rng);
        let lp = svf_multi(&b, 350.0 + s.vf * 40.0, 0.5, LP, 3, s.sr);
        let rev = reverb(&lp, 0.95, 0.55, s.sr);
        s.finish(s.drift(&gain(&rev, 0.35), 0.0, 0.009 * PHI, 0.04), 0.15)
    }
}

/// Distant stream, birdsong, wind in leaves.
mod nature_air {
    use super::*;
    use std::f32::consts::PI;

    pub(super) fn low_bed(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let b = brown(s.n, rng);
        let lp = svf_multi(&b, 120.0 + s.vf * 15.0, 0.5, LP, 3, s.sr);
        let env = s.env(0.08, 0.45, 0.45, s.v, rng);
        let out = multiply(&lp, &env);
        s.finish(s.drift(&out, 0.0, 0.015 * SQRT2, 0.07), 0.55)
    }

    /// Descending chirps with a sin² bell, over band-passed leaf rustle.
    pub(super) fn mid_texture(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let mut out = vec![0.0_f32; s.n];
        let chirps = 18 + s.v * 4;
        let span = (s.n as f32 - s.sr * 0.3).max(1.0);
        for _ in 0..chirps {
            let start = (rng.next_f32() * span) as usize;
            let len = ((s.sr * (0.06 + rng.next_f32() * 0.14)) as usize).max(1);
            let f0 = 3000.0 + rng.next_f32() * 2500.0;
            let f1 = f0 * (0.6 + rng.next_f32() * 0.3);
            let amp = 0.12 + rng.next_f32() * 0.2;
            let mut phase = 0.0_f32;
            for i in 0..len {
                let Some(dst) = out.get_mut(start + i) else { break };
                let t = i as f32 / len as f32;
                let bell = (PI * t).sin().powi(2);
                *dst += amp * bell * phase.sin();
                phase += std::f32::consts::TAU * (f0 + (f1 - f0) * t) / s.sr;
            }
        }
        let leaf = pink(s.n, rng, 2);
        let leaf_bp = svf(&leaf, 2800.0 + s.vf * 400.0, 0.8, BP, s.sr);
        let leaf_env = s.env(0.3, 0.05, 0.15, s.v + 5, rng);
        mix_in_place(&mut out, &multiply(&leaf_bp, &leaf_env), 1.0);
        let pan = if s.v % 2 == 0 { -0.3 } else { 0.3 };
        s.finish(s.drift(&out, pan, 0.045 * PHI, 0.25), 0.45)
    }

    pub(super) fn air(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let p = pink(s.n, rng, 3);
        let hp = svf(&p, 1800.0, 0.6, HP, s.sr);
        let gust = s.env(0.12, 0.12, 0.55, s.v, rng);
        let gusted = multiply(&hp, &gust);
        s.finish(s.drift(&gusted, 0.0, 0.053 * SQRT3, 0.3), 0.35)
    }

    pub(super) fn room(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let b = brown(s.n, rng);
        let bp = svf(&b, 700.0 + s.vf * 80.0, 0.7, BP, s.sr);
        let lp = svf_multi(&bp, 2200.0, 0.5, LP, 2, s.sr);
        let gurgle = s.env(0.25, 0.35, 0.4, s.v + 2, rng);
        let stream = multiply(&lp, &gurgle);
        let rev = reverb(&stream, 0.55, 0.6, s.sr);
        let out = blend(&stream, 0.5, &rev, 0.35);
        s.finish(s.drift(&out, 0.0, 0.017 * SQRT2, 0.08), 0.2)
    }
}

/// Dense pink rain, no individual drops.
mod rain_gentle {
    use super::*;

    pub(super) fn low_bed(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let b = brown(s.n, rng);
        let lp = svf_multi(&b, 85.0 + s.vf * 12.0, 0.4, LP, 3, s.sr);
        let env = s.env(0.065, 0.5, 0.4, s.v, rng);
        let out = multiply(&lp, &env);
        s.finish(s.drift(&out, 0.0, 0.012 * PHI, 0.05), 0.55)
    }

    /// Independent left and right streams with their own envelopes.
    pub(super) fn mid_texture(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let noise_l = pink(s.n, rng, 3);
        let noise_r = pink(s.n, rng, 3);
        let (hp_cut, lp_cut, bump_cut) = (450.0 + s.vf * 40.0, 6500.0 + s.vf * 200.0, 2200.0 + s.vf * 250.0);
        let body = |x: &[f32]| {
            let shaped = svf(&svf(x, hp_cut, 0.5, HP, s.sr), lp_cut, 0.5, LP, s.sr);
            let bump = svf(x, bump_cut, 0.7, BP, s.sr);
            blend(&shaped, 0.6, &bump, 0.25)
        };
        let (mono_l, mono_r) = (body(&noise_l), body(&noise_r));
        let env_l = s.env(0.08, 0.5, 0.35, s.v, rng);
        let env_r = s.env(0.08, 0.5, 0.35, s.v + 17, rng);
        let stereo = interleave(&multiply(&mono_l, &env_l), &multiply(&mono_r, &env_r));
        s.finish(stereo, 0.55)
    }

    pub(super) fn air(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let noise = white(s.n, rng);
        let hp = svf_multi(&noise, 4200.0 + s.vf * 400.0, 0.5, HP, 2, s.sr);
        let shaped = svf(&hp, 10_500.0 + s.vf * 400.0, 0.4, LP, s.sr);
        let env = s.env(0.1, 0.45, 0.3, s.v + 11, rng);
        let out = multiply(&shaped, &env);
        let rev = reverb(&out, 0.45, 0.7, s.sr);
        let mixed = blend(&out, 0.45, &rev, 0.3);
        s.finish(s.drift(&mixed, 0.0, 0.042 * SQRT5, 0.22), 0.3)
    }

    /// Rain heard through a wall: muffled, with a faint window resonance.
    pub(super) fn room(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let b = brown(s.n, rng);
        let wall = svf_multi(&b, 700.0 + s.vf * 80.0, 0.5, LP, 4, s.sr);
        let window = svf(&b, 350.0 + s.vf * 50.0, 1.2, BP, s.sr);
        let mixed = blend(&wall, 0.5, &window, 0.1);
        let rev = reverb(&mixed, 0.8, 0.7, s.sr);
        let out = blend(&mixed, 0.35, &rev, 0.4);
        s.finish(s.drift(&out, 0.0, 0.015 * SQRT3, 0.06), 0.22)
    }
}

/// Consonant drone with a faint 40 Hz component.
mod deep_hum {
    use super::*;

    pub(super) fn low_bed(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let f = 55.0 + s.vf * 3.0;
        let mixed = sum(&[
            s.fm(f, 0.45, 0.006, 0.15),
            s.tone(f * 2.001, 0.2),
            s.tone(f * 3.0005, 0.07),
            s.fm(40.0, 0.12, 0.003, 0.08),
        ]);
        let warm = saturate_buf(&mixed, 1.15);
        let lp = svf_multi(&warm, 190.0 + s.vf * 12.0, 0.5, LP, 2, s.sr);
        let env = s.env(0.05, 0.7, 0.3, s.v, rng);
        let out = multiply(&lp, &env);
        s.finish(s.drift(&out, 0.0, 0.008 * PHI, 0.03), 0.65)
    }

    /// Detuned pairs per partial beat at 2 to 5 Hz.
    pub(super) fn mid_texture(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let f = 55.0 + s.vf * 3.0;
        let mut out = vec![0.0; s.n];
        for p in [2.0_f32, 3.0, 4.0, 6.0, 8.0] {
            let beat = 2.0 + rng.next_f32() * 3.0;
            let amp = 0.11 / p.sqrt() * 0.7;
            mix_in_place(&mut out, &s.tone(f * p + beat * 0.5, amp), 1.0);
            mix_in_place(&mut out, &s.tone(f * p - beat * 0.5, amp), 1.0);
        }
        let lp = svf_multi(&out, 380.0 + s.vf * 35.0, 0.6, LP, 2, s.sr);
        let env = s.env(0.045, 0.55, 0.4, s.v + 5, rng);
        let modded = multiply(&lp, &env);
        s.finish(s.drift(&modded, (s.vf - 1.5) * 0.15, 0.016 * SQRT2, 0.08), 0.4)
    }

    pub(super) fn air(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let b = brown(s.n, rng);
        let hp = svf(&b, 3000.0, 0.5, HP, s.sr);
        let lp = svf(&hp, 8000.0, 0.4, LP, s.sr);
        let rev = reverb(&lp, 0.75, 0.65, s.sr);
        let mixed = blend(&lp, 0.25, &rev, 0.45);
        let env = s.env(0.035, 0.4, 0.35, s.v + 9, rng);
        let out = multiply(&mixed, &env);
        s.finish(s.drift(&out, 0.0, 0.029 * SQRT3, 0.12), 0.18)
    }
}

/// Room tone, formant murmur, soft clinks.
mod cafe_murmur {
    use super::*;

    pub(super) fn low_bed(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let b = brown(s.n, rng);
        let lp = svf_multi(&b, 180.0 + s.vf * 25.0, 0.5, LP, 3, s.sr);
        let mut mixed = gain(&lp, 0.5);
        mix_in_place(&mut mixed, &s.fm(60.0, 0.06, 0.3, 0.2), 1.0);
        mix_in_place(&mut mixed, &s.tone(120.0, 0.03), 1.0);
        let warm = saturate_buf(&mixed, 1.15);
        let env = s.env(0.06, 0.65, 0.3, s.v, rng);
        let out = multiply(&warm, &env);
        s.finish(s.drift(&out, 0.0, 0.009 * PHI, 0.03), 0.5)
    }

    /// Indistinct voices: brown noise through three broad formants each,
    /// gated by a syllable-rate envelope that never closes fully.
    pub(super) fn mid_texture(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let b = brown(s.n, rng);
        let mut voices = vec![0.0; s.n];
        for vv in 0..(7 + s.v * 2) {
            let f1 = 350.0 + rng.next_f32() * 350.0;
            let f2 = 1100.0 + rng.next_f32() * 800.0;
            let f3 = 2300.0 + rng.next_f32() * 600.0;
            let bp1 = svf(&b, f1, 1.0 + rng.next_f32() * 0.8, BP, s.sr);
            let bp2 = svf(&b, f2, 1.2 + rng.next_f32() * 0.8, BP, s.sr);
            let bp3 = svf(&b, f3, 1.5 + rng.next_f32() * 0.6, BP, s.sr);
            let syllable_base = 1.2 + rng.next_f32() * 1.5;
            let syllable = s.env(syllable_base, 0.35, 0.5, vv * 3 + s.v, rng);
            let voice_gain = 0.1 + rng.next_f32() * 0.03;
            for (i, out) in voices.iter_mut().enumerate() {
                *out += (bp1[i] * 0.45 + bp2[i] * 0.3 + bp3[i] * 0.15) * syllable[i] * voice_gain;
            }
        }
        s.finish(s.drift(&voices, (s.vf - 2.0) * 0.25, 0.033 * SQRT2, 0.18), 0.5)
    }

    pub(super) fn air(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let imp = impulses(s.n, 1.5 + s.vf * 0.8, rng, s.sr);
        let bp1 = svf(&imp, 2500.0 + s.vf * 300.0, 1.5, BP, s.sr);
        let bp2 = svf(&imp, 4200.0 + s.vf * 200.0, 1.0, BP, s.sr);
        let mixed = blend(&bp1, 0.35, &bp2, 0.15);
        let lp = svf(&mixed, 5500.0, 0.5, LP, s.sr);
        let smoothed = svf(&lp, 500.0, 0.3, LP, s.sr);
        let rev = reverb(&smoothed, 0.75, 0.6, s.sr);
        let out = blend(&smoothed, 0.25, &rev, 0.55);
        s.finish(s.drift(&out, 0.0, 0.04 * SQRT5, 0.18), 0.25)
    }

    pub(super) fn room(s: &Ctx, rng: &mut Mulberry32) -> Vec<f32> {
        let b = brown(s.n, rng);
        let bp = svf(&b, 550.0 + s.vf * 80.0, 0.7, BP, s.sr);
        let rev = reverb(&bp, 0.9, 0.55, s.sr);
        let hiss_noise = white(s.n, rng);
        let hiss = svf_multi(&hiss_noise, 4500.0, 0.6, HP, 2, s.sr);
        let hiss_env = s.env(0.1, 0.0, 0.05, s.v + 13, rng);
        let out = blend(&rev, 0.25, &multiply(&hiss, &hiss_env), 1.0);
        s.finish(s.drift(&out, 0.0, 0.014 * SQRT3, 0.06), 0.18)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::dsp::peak;
    use murmur_core::rng::seed_for_asset;

    fn short() -> SynthSpec {
        SynthSpec { sample_rate: 8000, duration_secs: 2.0 }
    }

    #[test]
    fn every_layer_renders_stereo_at_its_ceiling() {
        let spec = short();
        for p in Profile::ALL {
            for d in p.layers() {
                let id = p.asset_id(d.layer, 1);
                let mut rng = seed_for_asset(&id, 1);
                let out = p.synthesize(d.layer, 0, &mut rng, &spec).unwrap();
                assert_eq!(out.len(), spec.frames() * 2, "{id}");
                assert!(out.iter().all(|x| x.is_finite()), "{id}");
                let pk = peak(&out);
                assert!(pk <= 1.0 && pk > 0.1, "{id}: peak {pk}");
            }
        }
    }

    #[test]
    fn synthesis_is_deterministic() {
        let spec = short();
        let render = || {
            let mut rng = seed_for_asset("rain_gentle_mid_texture_02", 2);
            Profile::RainGentle.synthesize(Layer::MidTexture, 1, &mut rng, &spec).unwrap()
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn variants_differ() {
        let spec = short();
        let mut a = seed_for_asset("x", 1);
        let mut b = seed_for_asset("x", 1);
        let v0 = Profile::FocusWarm.synthesize(Layer::LowBed, 0, &mut a, &spec).unwrap();
        let v1 = Profile::FocusWarm.synthesize(Layer::LowBed, 1, &mut b, &spec).unwrap();
        assert_ne!(v0, v1);
    }

    #[test]
    fn deep_hum_has_no_room() {
        let mut rng = Mulberry32::new(1);
        assert!(Profile::DeepHum.synthesize(Layer::Room, 0, &mut rng, &short()).is_none());
    }

    #[test]
    fn naming() {
        assert_eq!(Profile::NatureAir.asset_id(Layer::Air, 3), "nature_air_air_03");
        assert_eq!(
            Profile::RainGentle.asset_path(Layer::LowBed, 1),
            "rain/rain_gentle/low_bed/rain_gentle_low_bed_01_v1.wav"
        );
        assert_eq!("deep_hum".parse::<Profile>().unwrap(), Profile::DeepHum);
        assert!(matches!("lofi".parse::<Profile>(), Err(EngineError::UnknownProfile { .. })));
    }
}
