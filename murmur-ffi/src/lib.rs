//! C ABI wrapper for the murmur player.
//!
//! Exposes the host-facing operations of [`murmur_engine::Player`] over an
//! opaque handle, plus a render call for hosts that own the audio device.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `MurmurPlayer` (heap-allocated; free it with `murmur_destroy`).
//! - Null handles and null buffers are ignored.
//! - Timers run on the wall clock; call `murmur_poll` regularly (every 50 ms is plenty).
//!
//! Threading
//! - The object is NOT thread-safe; call all functions from one thread, or
//!   serialize access yourself.

use std::ffi::{c_char, CStr};
use std::path::PathBuf;

use murmur_engine::history::JsonFileStore;
use murmur_engine::{
    CategoryFilter, FsLoader, PlayHistory, Player, PlayerConfig, PreferenceSnapshot, SystemScheduler,
};

/// Opaque player wrapper we hand to C.
pub struct MurmurPlayer {
    inner: Player<FsLoader, SystemScheduler>,
    // stereo render scratch, resized to the host's block size
    scratch: Vec<f32>,
}

/// Listener preferences as pushed by the host.
///
/// `category` is a NUL-terminated name (`"rain"`, `"focus"`, ...) or null
/// for all categories. Unknown names mean all categories.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct MurmurPrefs {
    pub enabled: bool,
    pub volume: f32,
    pub category: *const c_char,
    pub pause_on_activity: bool,
    pub reduced_motion: bool,
    pub screen_reader_mode: bool,
}

unsafe fn opt_str<'a>(p: *const c_char) -> Option<&'a str> {
    if p.is_null() {
        return None;
    }
    CStr::from_ptr(p).to_str().ok()
}

impl MurmurPrefs {
    unsafe fn to_snapshot(self) -> PreferenceSnapshot {
        let category = opt_str(self.category).and_then(|s| s.parse().ok()).unwrap_or(CategoryFilter::All);
        PreferenceSnapshot {
            enabled: self.enabled,
            volume: self.volume,
            category,
            pause_on_activity: self.pause_on_activity,
            reduced_motion: self.reduced_motion,
            screen_reader_mode: self.screen_reader_mode,
        }
    }
}

// --- Creation / destruction -------------------------------------------------------

/// Create a player reading `assets_dir/manifest.json`.
///
/// `history_path` may be null for an in-memory history. Returns null when
/// `assets_dir` is null or not UTF-8.
///
/// # Safety
/// String arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn murmur_create(
    assets_dir: *const c_char,
    history_path: *const c_char,
    sample_rate: u32,
) -> *mut MurmurPlayer {
    let Some(assets) = opt_str(assets_dir) else {
        return std::ptr::null_mut();
    };
    let config = PlayerConfig { sample_rate: sample_rate.max(1), ..PlayerConfig::default() };
    let history = match opt_str(history_path) {
        Some(p) => PlayHistory::open(Box::new(JsonFileStore::new(PathBuf::from(p))), config.history_cap),
        None => PlayHistory::in_memory(),
    };
    let inner = Player::new(config, FsLoader::new(assets), SystemScheduler::new(), history);
    Box::into_raw(Box::new(MurmurPlayer { inner, scratch: Vec::new() }))
}

/// Destroy a player previously returned by `murmur_create`.
///
/// # Safety
/// `player` must be null or a pointer from `murmur_create` not yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn murmur_destroy(player: *mut MurmurPlayer) {
    if !player.is_null() {
        drop(Box::from_raw(player));
    }
}

// --- Host operations -------------------------------------------------------------

macro_rules! with_player {
    ($ptr:expr, |$p:ident| $body:expr) => {{
        if $ptr.is_null() {
            return;
        }
        let $p = &mut *$ptr;
        $body;
    }};
}

/// # Safety
/// `player` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn murmur_start(player: *mut MurmurPlayer) {
    with_player!(player, |p| p.inner.start())
}

/// # Safety
/// `player` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn murmur_stop(player: *mut MurmurPlayer) {
    with_player!(player, |p| p.inner.stop())
}

/// # Safety
/// `player` must be null or a live handle; `prefs.category` null or a valid C string.
#[no_mangle]
pub unsafe extern "C" fn murmur_set_preferences(player: *mut MurmurPlayer, prefs: MurmurPrefs) {
    with_player!(player, |p| p.inner.set_preferences(prefs.to_snapshot()))
}

/// # Safety
/// `player` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn murmur_skip_track(player: *mut MurmurPlayer) {
    with_player!(player, |p| p.inner.skip_track())
}

/// # Safety
/// `player` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn murmur_note_typing_activity(player: *mut MurmurPlayer) {
    with_player!(player, |p| p.inner.note_typing_activity())
}

/// # Safety
/// `player` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn murmur_set_visibility_paused(player: *mut MurmurPlayer, hidden: bool) {
    with_player!(player, |p| p.inner.set_visibility_paused(hidden))
}

/// Signal that the output device is unlocked (true) or gone (false).
///
/// # Safety
/// `player` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn murmur_set_device_ready(player: *mut MurmurPlayer, ready: bool) {
    with_player!(player, |p| p.inner.set_device_ready(ready))
}

/// Fire due timers and run queued work. Decoding happens here, never in render.
///
/// # Safety
/// `player` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn murmur_poll(player: *mut MurmurPlayer) {
    with_player!(player, |p| p.inner.poll())
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels` channels.
/// The player is stereo; mono hosts get the average, extra channels get silence.
///
/// Returns the number of frames rendered (0 on error).
///
/// # Safety
/// `out_interleaved` must point to at least `frames * channels` writable floats.
#[no_mangle]
pub unsafe extern "C" fn murmur_render_interleaved_f32(
    player: *mut MurmurPlayer,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if player.is_null() || out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let p = &mut *player;
    let ch = channels as usize;
    let out = std::slice::from_raw_parts_mut(out_interleaved, (frames as usize) * ch);

    p.scratch.resize(frames as usize * 2, 0.0);
    p.inner.render(&mut p.scratch);

    for (frame, lr) in out.chunks_exact_mut(ch).zip(p.scratch.chunks_exact(2)) {
        if ch == 1 {
            frame[0] = 0.5 * (lr[0] + lr[1]);
        } else {
            frame[0] = lr[0];
            frame[1] = lr[1];
            frame[2..].fill(0.0);
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    use murmur_engine::generate::write_wav_16;

    fn asset_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{"version": 1, "tracks": [{"id": "rain_a", "category": "rain", "path": "a.wav"}]}"#,
        )
        .unwrap();
        write_wav_16(&dir.path().join("a.wav"), 8000, &vec![0.5; 8000 * 2]).unwrap();
        dir
    }

    fn prefs(category: &CString) -> MurmurPrefs {
        MurmurPrefs {
            enabled: true,
            volume: 1.0,
            category: category.as_ptr(),
            pause_on_activity: false,
            reduced_motion: false,
            screen_reader_mode: false,
        }
    }

    #[test]
    fn null_handles_are_ignored() {
        let none = std::ptr::null_mut();
        let cat = CString::new("rain").unwrap();
        unsafe {
            murmur_start(none);
            murmur_set_preferences(none, prefs(&cat));
            murmur_poll(none);
            murmur_destroy(none);
            let mut buf = [0.0_f32; 4];
            assert_eq!(murmur_render_interleaved_f32(none, buf.as_mut_ptr(), 2, 2), 0);
            assert!(murmur_create(std::ptr::null(), std::ptr::null(), 48_000).is_null());
        }
    }

    #[test]
    fn plays_through_the_c_surface() {
        let dir = asset_dir();
        let path = CString::new(dir.path().to_str().unwrap()).unwrap();
        let cat = CString::new("rain").unwrap();
        unsafe {
            let p = murmur_create(path.as_ptr(), std::ptr::null(), 8000);
            assert!(!p.is_null());
            murmur_set_device_ready(p, true);
            murmur_set_preferences(p, prefs(&cat));
            murmur_start(p);
            murmur_poll(p);

            let mut out = vec![0.0_f32; 8000];
            // two seconds of mono at 8 kHz; master ramps in over the first second
            assert_eq!(murmur_render_interleaved_f32(p, out.as_mut_ptr(), 8000, 1), 8000);
            assert_eq!(murmur_render_interleaved_f32(p, out.as_mut_ptr(), 8000, 1), 8000);
            assert!(out.iter().all(|s| (s - 0.35).abs() < 1e-3));

            let mut quad = vec![1.0_f32; 4 * 16];
            murmur_render_interleaved_f32(p, quad.as_mut_ptr(), 16, 4);
            assert!(quad.chunks(4).all(|f| f[2] == 0.0 && f[3] == 0.0 && f[0] > 0.0));

            murmur_destroy(p);
        }
    }

    #[test]
    fn unknown_category_means_all() {
        let cat = CString::new("lofi").unwrap();
        let snap = unsafe { prefs(&cat).to_snapshot() };
        assert_eq!(snap.category, CategoryFilter::All);
        let snap = unsafe { MurmurPrefs { category: std::ptr::null(), ..prefs(&cat) }.to_snapshot() };
        assert_eq!(snap.category, CategoryFilter::All);
    }
}
