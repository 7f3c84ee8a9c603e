//! Player tuning and listener preferences.
//!
//! [`PlayerConfig`] is static for the life of a player and can be loaded from
//! JSON; every field has a default so partial files work. [`PreferenceSnapshot`]
//! is what the host pushes whenever the listener changes a setting.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::manifest::CategoryFilter;

/// Hard ceiling on output gain.
pub const MAX_VOLUME: f32 = 0.7;

/// Slider position to output gain: `clamp(s², 0, 1) * max`.
///
/// Zero at 0, `max` at 1, monotone in between. Out-of-range and NaN input
/// is clamped.
pub fn effective_volume(slider: f32, max: f32) -> f32 {
    let s = if slider.is_nan() { 0.0 } else { slider.clamp(0.0, 1.0) };
    (s * s).clamp(0.0, 1.0) * max.max(0.0)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    pub max_volume: f32,
    pub crossfade_min_secs: f32,
    pub crossfade_max_secs: f32,
    pub rotation_min_ms: u64,
    pub rotation_max_ms: u64,
    /// Idle time after the last activity before a duck is released.
    pub duck_restore_ms: u64,
    pub duck_fade_secs: f32,
    pub duck_restore_ramp_secs: f32,
    pub hide_fade_secs: f32,
    pub show_ramp_secs: f32,
    pub volume_ramp_secs: f32,
    pub stop_fade_secs: f32,
    pub stop_tail_secs: f32,
    /// Fade on the old slot when a fresh pick replaces it without a crossfade.
    pub play_over_fade_secs: f32,
    pub crossfade_tail_secs: f32,
    pub master_ramp_on_play_secs: f32,
    pub cache_capacity: usize,
    pub manifest_refresh_ms: u64,
    pub loop_offset_max_secs: f32,
    pub history_cap: usize,
    pub rng_seed: Option<u64>,
    pub sample_rate: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_volume: MAX_VOLUME,
            crossfade_min_secs: 6.0,
            crossfade_max_secs: 8.0,
            rotation_min_ms: 5 * 60_000,
            rotation_max_ms: 10 * 60_000,
            duck_restore_ms: 900,
            duck_fade_secs: 0.12,
            duck_restore_ramp_secs: 0.6,
            hide_fade_secs: 0.6,
            show_ramp_secs: 0.8,
            volume_ramp_secs: 0.4,
            stop_fade_secs: 0.5,
            stop_tail_secs: 0.1,
            play_over_fade_secs: 1.0,
            crossfade_tail_secs: 0.2,
            master_ramp_on_play_secs: 1.0,
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
            manifest_refresh_ms: 60_000,
            loop_offset_max_secs: 8.0,
            history_cap: crate::history::HISTORY_CAP,
            rng_seed: None,
            sample_rate: 48_000,
        }
    }
}

impl PlayerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str::<Self>(&text)?.sanitized())
    }

    /// Repair inverted bands and out-of-range values.
    pub fn sanitized(mut self) -> Self {
        self.max_volume = self.max_volume.clamp(0.0, 1.0);
        if self.crossfade_min_secs > self.crossfade_max_secs {
            std::mem::swap(&mut self.crossfade_min_secs, &mut self.crossfade_max_secs);
        }
        if self.rotation_min_ms > self.rotation_max_ms {
            std::mem::swap(&mut self.rotation_min_ms, &mut self.rotation_max_ms);
        }
        self.crossfade_min_secs = self.crossfade_min_secs.max(0.0);
        self.cache_capacity = self.cache_capacity.max(1);
        self.history_cap = self.history_cap.max(1);
        self.sample_rate = self.sample_rate.max(1);
        self.loop_offset_max_secs = self.loop_offset_max_secs.max(0.0);
        self
    }
}

/// Listener settings as last pushed by the host.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PreferenceSnapshot {
    pub enabled: bool,
    pub volume: f32,
    pub category: CategoryFilter,
    #[serde(alias = "pauseOnTyping")]
    pub pause_on_activity: bool,
    pub reduced_motion: bool,
    pub screen_reader_mode: bool,
}

impl Default for PreferenceSnapshot {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: 0.25,
            category: CategoryFilter::All,
            pause_on_activity: false,
            reduced_motion: false,
            screen_reader_mode: false,
        }
    }
}

impl PreferenceSnapshot {
    /// Enabled and not suppressed for assistive technology.
    pub fn audible(&self) -> bool {
        self.enabled && !self.screen_reader_mode
    }

    /// Same snapshot with the volume forced into [0, 1].
    pub fn clamped(mut self) -> Self {
        self.volume = if self.volume.is_nan() { 0.0 } else { self.volume.clamp(0.0, 1.0) };
        self
    }
}
