//! Murmur Core — deterministic DSP primitives for baked ambient soundscapes.
//!
//! Features
//! - `std`      : (default) standard library float intrinsics
//! - `libm`     : route transcendental math through `libm` for cross-platform
//!                bit-identical asset builds
//! - `fast-math`: approximations for tanh/tan in realtime paths
//!
//! Modules
//! - [`dsp`]         : math backend, dB, saturation, whole-buffer helpers
//! - [`filters`]     : TPT SVF, one-pole, comb, allpass
//! - [`noise`]       : white / pink / brown noise, sparse impulses
//! - [`oscillators`] : sine (FM), triangle, polyBLEP saw
//! - [`envelopes`]   : breakpoint and aperiodic envelopes
//! - [`spatial`]     : constant-power and drifting pan
//! - [`reverb`]      : 4-comb + 2-allpass network
//! - [`rng`]         : string-seeded Mulberry32
//!
//! Design
//! - Every primitive is a pure function of its inputs (including any random
//!   source passed in). Identical inputs give identical buffers.

pub mod dsp;
pub mod envelopes;
pub mod filters;
pub mod noise;
pub mod oscillators;
pub mod reverb;
pub mod rng;
pub mod spatial;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        db_to_lin, fade_stereo, gain, lin_to_db, mix, multiply, normalize, peak, saturate_buf, soft_clip, TAU,
    };
    pub use crate::envelopes::{aperiodic, breakpoints, Aperiodic, Breakpoint, PHI, SQRT2, SQRT3, SQRT5};
    pub use crate::filters::{allpass, comb, svf, svf_multi, OnePoleLp, SvfMode, SvfTpt};
    pub use crate::noise::{brown, impulses, pink, white};
    pub use crate::oscillators::{saw, sine, triangle, Wave};
    pub use crate::reverb::{reverb, Reverb};
    pub use crate::rng::{hash_seed, seed_for_asset, Mulberry32};
    pub use crate::spatial::{interleave, pan_gains, to_stereo, to_stereo_drift};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let mut rng = Mulberry32::from_str_seed("smoke");
        let n = 4800;
        let noise = pink(n, &mut rng, 3);
        let shaped = svf(&noise, 800.0, 0.7, SvfMode::Lowpass, 48_000.0);
        let env = aperiodic(n, 0.1, 0.5, 0.5, 0, &mut rng, 48_000.0);
        let mut st = to_stereo(&multiply(&shaped, &env), 0.0);
        fade_stereo(&mut st, 0.01, 0.01, 48_000.0);
        normalize(&mut st, 0.5);
        assert!((peak(&st) - 0.5).abs() < 1e-5);
    }
}
