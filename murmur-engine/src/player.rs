//! The runtime player: selection, crossfade, rotation, duck and visibility.
//!
//! States
//! - `Idle`        : no current slot.
//! - `Playing`     : one slot at (or ramping to) unity.
//! - `Crossfading` : a current slot ramping up and an outgoing one ramping down.
//!
//! Duck and visibility pause are not states; both only move the master gain.
//!
//! Host contract
//! - Public operations update state, enqueue work and return.
//! - [`Player::poll`] fires due timers and drains queued work (fresh plays,
//!   rotations, preloads). Call it from the host loop.
//! - [`Player::render`] is the audio pull.
//!
//! Failures never escape: a bad asset is dropped from the current attempt and
//! the pick is retried; with nothing playable the player stays silent and can
//! be started again later.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::LruCache;
use crate::config::{effective_volume, PlayerConfig, PreferenceSnapshot};
use crate::error::Result;
use crate::history::{select_excluding, PlayHistory, SessionHistory};
use crate::loader::{AssetLoader, DecodedBuffer};
use crate::manifest::{parse_manifest, AudioAsset, Manifest, ManifestParse};
use crate::mixer::{Mixer, PlaybackSlot};
use crate::scheduler::{Scheduler, TimerHandle, TimerKind};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Idle,
    Playing,
    Crossfading,
}

/// Diagnostic snapshot; nothing in it feeds back into the player.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub started: bool,
    pub device_ready: bool,
    pub current: Option<String>,
    pub outgoing: Option<String>,
    pub preloaded: Option<String>,
    pub master_gain: f32,
    pub master_target: f32,
    pub rotation_pending: bool,
    pub duck_pending: bool,
    pub catalog_size: usize,
    pub candidates: usize,
    pub cached_buffers: usize,
    pub session_plays: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Task {
    Start,
    PlayFresh,
    /// `forced` rotations (skip, category change) ignore reduced motion.
    Rotate { forced: bool },
    Preload { generation: u64 },
}

#[derive(Debug)]
struct Preloaded {
    asset: AudioAsset,
    buffer: Arc<DecodedBuffer>,
    generation: u64,
}

pub struct Player<L: AssetLoader, S: Scheduler> {
    config: PlayerConfig,
    loader: L,
    scheduler: S,
    mixer: Mixer,
    cache: LruCache<String, Arc<DecodedBuffer>>,
    history: PlayHistory,
    session: SessionHistory,
    prefs: PreferenceSnapshot,
    manifest: Option<Manifest>,
    manifest_loaded_at: Option<i64>,
    started: bool,
    paused_by_visibility: bool,
    rotation_timer: Option<TimerHandle>,
    duck_timer: Option<TimerHandle>,
    preload: Option<Preloaded>,
    preload_generation: u64,
    tasks: VecDeque<Task>,
    rng: StdRng,
}

impl<L: AssetLoader, S: Scheduler> std::fmt::Debug for Player<L, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("started", &self.started)
            .field("current", &self.mixer.current_id())
            .field("prefs", &self.prefs)
            .finish()
    }
}

impl<L: AssetLoader, S: Scheduler> Player<L, S> {
    pub fn new(config: PlayerConfig, loader: L, scheduler: S, history: PlayHistory) -> Self {
        let config = config.sanitized();
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            mixer: Mixer::new(config.sample_rate),
            cache: LruCache::new(config.cache_capacity),
            config,
            loader,
            scheduler,
            history,
            session: SessionHistory::default(),
            prefs: PreferenceSnapshot::default(),
            manifest: None,
            manifest_loaded_at: None,
            started: false,
            paused_by_visibility: false,
            rotation_timer: None,
            duck_timer: None,
            preload: None,
            preload_generation: 0,
            tasks: VecDeque::new(),
            rng,
        }
    }

    pub fn config(&self) -> &PlayerConfig { &self.config }
    pub fn preferences(&self) -> &PreferenceSnapshot { &self.prefs }
    pub fn history(&self) -> &PlayHistory { &self.history }
    pub fn session(&self) -> &SessionHistory { &self.session }
    pub fn loader(&self) -> &L { &self.loader }
    pub fn loader_mut(&mut self) -> &mut L { &mut self.loader }
    pub fn scheduler(&self) -> &S { &self.scheduler }
    pub fn scheduler_mut(&mut self) -> &mut S { &mut self.scheduler }
    pub fn is_started(&self) -> bool { self.started }

    // ------------------------------------------------------------------
    // Host-facing operations
    // ------------------------------------------------------------------

    /// Idempotent. A no-op until the device is ready.
    pub fn start(&mut self) {
        if self.started {
            debug!("start skipped, already started");
            return;
        }
        if !self.mixer.device_ready() {
            warn!("start ignored, audio device not ready");
            return;
        }
        info!("player starting");
        self.started = true;
        self.tasks.push_back(Task::Start);
    }

    /// Fade everything out and cancel all timers. Idempotent.
    pub fn stop(&mut self) {
        if self.started {
            info!("player stopping");
        }
        self.fade_out_and_clear();
        self.clear_rotation_timer();
        self.tasks.clear();
        self.started = false;
    }

    /// Apply a new preference snapshot against live state. The latest call wins.
    pub fn set_preferences(&mut self, next: PreferenceSnapshot) {
        let prev = self.prefs;
        self.prefs = next.clamped();
        let (was_on, now_on) = (prev.audible(), self.prefs.audible());

        self.apply_master_volume(self.config.volume_ramp_secs);

        if was_on && !now_on {
            debug!("disabled, fading out");
            self.fade_out_and_clear();
            self.clear_rotation_timer();
            self.tasks.retain(|t| *t == Task::Start);
            return;
        }

        if !was_on && now_on && self.started {
            debug!("re-enabled, picking fresh");
            self.tasks.push_back(Task::PlayFresh);
            self.schedule_rotation();
            return;
        }

        if prev.category != self.prefs.category && now_on && self.started {
            debug!(category = %String::from(self.prefs.category), "category changed");
            self.invalidate_preload();
            if self.mixer.current().is_some() {
                self.tasks.push_back(Task::Rotate { forced: true });
            } else {
                self.tasks.push_back(Task::PlayFresh);
                self.schedule_rotation();
            }
            return;
        }

        if prev.reduced_motion != self.prefs.reduced_motion && now_on && self.started {
            if self.prefs.reduced_motion {
                self.clear_rotation_timer();
            } else if self.mixer.current().is_some() {
                self.schedule_rotation();
            }
        }
    }

    /// Crossfade to a new pick now and restart the rotation countdown.
    pub fn skip_track(&mut self) {
        if !self.started || !self.should_play() {
            return;
        }
        self.tasks.push_back(Task::Rotate { forced: true });
    }

    /// Duck the output and arm the restore timer. Only with pause-on-activity.
    pub fn note_typing_activity(&mut self) {
        if !self.prefs.pause_on_activity || !self.mixer.device_ready() {
            return;
        }
        self.mixer.ramp_master(0.0, self.config.duck_fade_secs);
        if let Some(h) = self.duck_timer.take() {
            self.scheduler.cancel(h);
        }
        self.duck_timer = Some(self.scheduler.schedule(self.config.duck_restore_ms, TimerKind::DuckRestore));
    }

    /// Fade toward silence while hidden; restore on return.
    pub fn set_visibility_paused(&mut self, hidden: bool) {
        self.paused_by_visibility = hidden;
        if !self.mixer.device_ready() {
            return;
        }
        if hidden {
            self.mixer.ramp_master(0.0, self.config.hide_fade_secs);
        } else {
            self.apply_master_volume(self.config.show_ramp_secs);
        }
    }

    /// Output unlock signal. Losing the device resets the player to a
    /// restartable idle state.
    pub fn set_device_ready(&mut self, ready: bool) {
        if ready == self.mixer.device_ready() {
            return;
        }
        info!(ready, "audio device readiness changed");
        self.mixer.set_device_ready(ready);
        if !ready {
            self.stop();
        }
    }

    /// Fire due timers, refresh a stale manifest, then drain queued work.
    pub fn poll(&mut self) {
        for (handle, kind) in self.scheduler.take_due() {
            match kind {
                TimerKind::Rotation if self.rotation_timer == Some(handle) => {
                    self.rotation_timer = None;
                    self.tasks.push_back(Task::Rotate { forced: false });
                }
                TimerKind::DuckRestore if self.duck_timer == Some(handle) => {
                    self.duck_timer = None;
                    if self.should_play() {
                        self.apply_master_volume(self.config.duck_restore_ramp_secs);
                    }
                }
                _ => debug!(?kind, "stale timer ignored"),
            }
        }
        if self.started && self.manifest.is_some() {
            self.ensure_manifest();
        }
        while let Some(task) = self.tasks.pop_front() {
            self.run(task);
        }
    }

    /// Audio pull: interleaved stereo.
    pub fn render(&mut self, out: &mut [f32]) {
        self.mixer.render(out);
    }

    pub fn status(&self) -> PlayerStatus {
        let state = match (self.mixer.current(), self.mixer.outgoing()) {
            (None, _) => PlayerState::Idle,
            (Some(_), None) => PlayerState::Playing,
            (Some(_), Some(_)) => PlayerState::Crossfading,
        };
        PlayerStatus {
            state,
            started: self.started,
            device_ready: self.mixer.device_ready(),
            current: self.mixer.current_id().map(str::to_owned),
            outgoing: self.mixer.outgoing().map(|s| s.asset_id.clone()),
            preloaded: self.preload.as_ref().map(|p| p.asset.id.clone()),
            master_gain: self.mixer.master().value(),
            master_target: self.mixer.master().target(),
            rotation_pending: self.rotation_timer.is_some(),
            duck_pending: self.duck_timer.is_some(),
            catalog_size: self.manifest.as_ref().map_or(0, Manifest::len),
            candidates: self.manifest.as_ref().map_or(0, |m| m.filter(self.prefs.category).len()),
            cached_buffers: self.cache.len(),
            session_plays: self.session.len(),
        }
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    fn should_play(&self) -> bool {
        self.prefs.audible() && !self.paused_by_visibility
    }

    fn target_volume(&self) -> f32 {
        if self.should_play() {
            effective_volume(self.prefs.volume, self.config.max_volume)
        } else {
            0.0
        }
    }

    fn apply_master_volume(&mut self, secs: f32) {
        let v = self.target_volume();
        self.mixer.ramp_master(v, secs);
    }

    fn run(&mut self, task: Task) {
        match task {
            Task::Start => {
                self.ensure_manifest();
                let candidates = self.manifest.as_ref().map_or(0, |m| m.filter(self.prefs.category).len());
                info!(candidates, should_play = self.should_play(), "manifest ready");
                // a failed first pick still arms rotation, which retries it
                if self.should_play() {
                    self.play_fresh();
                    self.schedule_rotation();
                }
            }
            Task::PlayFresh => {
                self.play_fresh();
            }
            Task::Rotate { forced } => self.rotate(forced),
            Task::Preload { generation } => self.preload_next(generation),
        }
    }

    /// Reload the manifest unless the last load is recent. A failed reload
    /// keeps the previous catalog; with none, the catalog is empty.
    fn ensure_manifest(&mut self) {
        let now = self.scheduler.now_ms();
        if let (Some(_), Some(at)) = (&self.manifest, self.manifest_loaded_at) {
            if now - at < self.config.manifest_refresh_ms as i64 {
                return;
            }
        }
        self.manifest_loaded_at = Some(now);
        let text = match self.loader.load_manifest() {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "manifest unavailable");
                if self.manifest.is_none() {
                    self.manifest = Some(Manifest::default());
                }
                return;
            }
        };
        match parse_manifest(&text) {
            ManifestParse::Ok(m) => {
                debug!(tracks = m.len(), "manifest loaded");
                self.manifest = Some(m);
            }
            ManifestParse::Partial { manifest, dropped } => {
                warn!(tracks = manifest.len(), dropped, "manifest loaded with invalid entries dropped");
                self.manifest = Some(manifest);
            }
            ManifestParse::Err(e) => {
                warn!(error = %e, "manifest rejected");
                if self.manifest.is_none() {
                    self.manifest = Some(Manifest::default());
                }
            }
        }
        if let (Some(id), Some(m)) = (self.mixer.current_id(), &self.manifest) {
            if !m.contains(id) {
                info!(asset = id, "playing asset left the catalog, continuing");
            }
        }
    }

    fn pick(&mut self, rejected: &HashSet<String>) -> Option<AudioAsset> {
        let manifest = self.manifest.as_ref()?;
        let candidates = manifest.filter(self.prefs.category);
        let current = self.mixer.current_id();
        select_excluding(&candidates, current, &self.history, &self.session, rejected, &mut self.rng).cloned()
    }

    fn buffer_for(&mut self, asset: &AudioAsset) -> Result<Arc<DecodedBuffer>> {
        if let Some(b) = self.cache.get(&asset.path) {
            return Ok(Arc::clone(b));
        }
        let decoded = self.loader.load_asset(&asset.path)?;
        let buffer = Arc::new(decoded.resampled(self.config.sample_rate));
        self.cache.set(asset.path.clone(), Arc::clone(&buffer));
        Ok(buffer)
    }

    /// Pick and decode, dropping candidates that fail until one works or the
    /// pool is exhausted.
    fn acquire(&mut self) -> Option<(AudioAsset, Arc<DecodedBuffer>)> {
        let mut rejected = HashSet::new();
        loop {
            let asset = self.pick(&rejected)?;
            match self.buffer_for(&asset) {
                Ok(buffer) => return Some((asset, buffer)),
                Err(e) => {
                    warn!(asset = %asset.id, path = %asset.path, error = %e, code = e.error_code(), "asset failed, trying another");
                    rejected.insert(asset.id);
                }
            }
        }
    }

    fn make_slot(&mut self, asset: &AudioAsset, buffer: Arc<DecodedBuffer>, start_gain: f32) -> PlaybackSlot {
        let max_offset = (buffer.duration_secs() as f32 - 0.01).max(0.0);
        let offset_secs = (self.rng.gen::<f32>() * self.config.loop_offset_max_secs).clamp(0.0, max_offset);
        let offset_frames = (offset_secs * self.config.sample_rate as f32) as usize;
        PlaybackSlot::new(asset.id.clone(), buffer, offset_frames, start_gain)
    }

    fn note_played(&mut self, id: &str) {
        let now = self.scheduler.now_ms();
        self.session.push(id);
        self.history.note_played(id, now);
    }

    /// Replace whatever plays with a fresh pick. Returns whether anything plays.
    fn play_fresh(&mut self) -> bool {
        self.ensure_manifest();
        if !self.prefs.audible() {
            return false;
        }
        let Some((asset, buffer)) = self.acquire() else {
            warn!("nothing playable, staying silent");
            return false;
        };
        let slot = self.make_slot(&asset, buffer, 1.0);
        self.mixer.play_now(slot, self.config.play_over_fade_secs, self.config.stop_tail_secs);
        self.note_played(&asset.id);
        self.apply_master_volume(self.config.master_ramp_on_play_secs);
        info!(asset = %asset.id, path = %asset.path, volume = self.target_volume(), "playing");
        self.tasks.push_back(Task::Preload { generation: self.preload_generation });
        true
    }

    fn rotate(&mut self, forced: bool) {
        if !self.started {
            return;
        }
        if !self.should_play() {
            // hidden only: keep the countdown alive for when the view returns
            if !forced && self.prefs.audible() {
                self.schedule_rotation();
            }
            return;
        }
        if !forced && self.prefs.reduced_motion {
            return;
        }
        self.ensure_manifest();

        let preloaded = self.preload.take().filter(|p| {
            p.generation == self.preload_generation
                && self.prefs.category.accepts(p.asset.category)
                && self.manifest.as_ref().is_some_and(|m| m.contains(&p.asset.id))
                && self.mixer.current_id() != Some(p.asset.id.as_str())
        });
        let next = match preloaded {
            Some(p) => Some((p.asset, p.buffer)),
            None => self.acquire(),
        };
        let Some((asset, buffer)) = next else {
            warn!("rotation found nothing playable");
            self.schedule_rotation();
            return;
        };

        let (lo, hi) = (self.config.crossfade_min_secs, self.config.crossfade_max_secs);
        let fade = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
        let slot = self.make_slot(&asset, buffer, 0.0);
        self.mixer.crossfade_to(slot, fade, self.config.crossfade_tail_secs);
        self.note_played(&asset.id);
        info!(asset = %asset.id, fade_secs = fade, forced, "crossfading");

        self.invalidate_preload();
        self.tasks.push_back(Task::Preload { generation: self.preload_generation });
        self.schedule_rotation();
    }

    fn preload_next(&mut self, generation: u64) {
        if generation != self.preload_generation {
            debug!(generation, current = self.preload_generation, "stale preload dropped");
            return;
        }
        if !self.started || !self.prefs.audible() {
            return;
        }
        self.preload = self.acquire().map(|(asset, buffer)| {
            debug!(asset = %asset.id, "preloaded");
            Preloaded { asset, buffer, generation }
        });
    }

    fn invalidate_preload(&mut self) {
        self.preload = None;
        self.preload_generation += 1;
    }

    fn schedule_rotation(&mut self) {
        self.clear_rotation_timer();
        if self.prefs.reduced_motion {
            return;
        }
        let (lo, hi) = (self.config.rotation_min_ms, self.config.rotation_max_ms);
        let delay = if hi > lo { self.rng.gen_range(lo..=hi) } else { lo };
        debug!(delay_ms = delay, "rotation scheduled");
        self.rotation_timer = Some(self.scheduler.schedule(delay, TimerKind::Rotation));
    }

    fn clear_rotation_timer(&mut self) {
        if let Some(h) = self.rotation_timer.take() {
            self.scheduler.cancel(h);
        }
    }

    fn fade_out_and_clear(&mut self) {
        self.mixer.fade_out_all(self.config.stop_fade_secs, self.config.stop_tail_secs);
        self.invalidate_preload();
        if let Some(h) = self.duck_timer.take() {
            self.scheduler.cancel(h);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::scheduler::ManualScheduler;

    const MANIFEST: &str = r#"{"version": 1, "tracks": [
        {"id": "a", "category": "rain", "path": "a.wav"},
        {"id": "b", "category": "rain", "path": "b.wav"}
    ]}"#;

    fn player() -> Player<MemoryLoader, ManualScheduler> {
        let buf = DecodedBuffer::stereo(1000, vec![0.5; 2 * 1000]);
        let loader = MemoryLoader::new(MANIFEST).with_asset("a.wav", buf.clone()).with_asset("b.wav", buf);
        let config = PlayerConfig { sample_rate: 1000, rng_seed: Some(1), ..PlayerConfig::default() };
        let mut p = Player::new(config, loader, ManualScheduler::new(1), PlayHistory::in_memory());
        p.set_device_ready(true);
        p
    }

    #[test]
    fn start_before_device_ready_is_noop() {
        let mut p = player();
        p.set_device_ready(false);
        p.start();
        p.poll();
        assert!(!p.is_started());
        p.set_device_ready(true);
        p.set_preferences(PreferenceSnapshot { enabled: true, ..Default::default() });
        p.start();
        p.poll();
        assert_eq!(p.status().state, PlayerState::Playing);
    }

    #[test]
    fn start_while_disabled_stays_idle() {
        let mut p = player();
        p.start();
        p.poll();
        assert!(p.is_started());
        assert_eq!(p.status().state, PlayerState::Idle);
        assert_eq!(p.status().catalog_size, 2);
        assert!(!p.status().rotation_pending);
    }

    #[test]
    fn preload_is_the_other_asset() {
        let mut p = player();
        p.set_preferences(PreferenceSnapshot { enabled: true, ..Default::default() });
        p.start();
        p.poll();
        let s = p.status();
        assert!(s.current.is_some());
        assert!(s.preloaded.is_some());
        assert_ne!(s.current, s.preloaded);
        assert_eq!(s.cached_buffers, 2);
    }

    #[test]
    fn skip_uses_preload_without_decoding() {
        let mut p = player();
        p.set_preferences(PreferenceSnapshot { enabled: true, ..Default::default() });
        p.start();
        p.poll();
        let preloaded = p.status().preloaded;
        let requests = p.loader().requests.len();
        p.skip_track();
        p.poll();
        assert_eq!(p.status().current, preloaded);
        assert_eq!(p.status().state, PlayerState::Crossfading);
        assert_eq!(p.loader().requests.len(), requests);
    }
}
