//! Output stage: up to two looping playback slots into one master gain.
//!
//! Layout
//! - `current`  : the slot being faded in or held at unity.
//! - `outgoing` : the slot being faded out; dropped once its stop point passes.
//! - `master`   : shared gain ramp for volume, duck and visibility.
//!
//! Ownership only moves one way: `current` becomes `outgoing`, `outgoing` is
//! only ever told to stop. A crossfade over a crossfade folds the two fading
//! slots into one so the summed gain stays continuous. `render` does no
//! allocation.

use std::sync::Arc;

use tracing::debug;

use crate::loader::DecodedBuffer;

/// Linear ramp from the current value to a target over a number of frames.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GainRamp {
    value: f32,
    target: f32,
    step: f32,
    remaining: u64,
}

impl GainRamp {
    #[inline] pub fn new(value: f32) -> Self { Self { value, target: value, step: 0.0, remaining: 0 } }
    #[inline] pub fn value(&self) -> f32 { self.value }
    #[inline] pub fn target(&self) -> f32 { self.target }
    #[inline] pub fn is_settled(&self) -> bool { self.remaining == 0 }

    /// Jump immediately, cancelling any ramp in flight.
    #[inline]
    pub fn set_now(&mut self, v: f32) {
        self.value = v;
        self.target = v;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Start a ramp from wherever the value is now.
    pub fn ramp_to(&mut self, target: f32, frames: u64) {
        if frames == 0 {
            self.set_now(target);
            return;
        }
        self.target = target;
        self.remaining = frames;
        self.step = (target - self.value) / frames as f32;
    }

    /// Advance one frame; returns the gain for that frame.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.value = if self.remaining == 0 { self.target } else { self.value + self.step };
        }
        self.value
    }
}

/// One live asset: looping buffer, cursor and gain.
#[derive(Clone, Debug)]
pub struct PlaybackSlot {
    pub asset_id: String,
    pub buffer: Arc<DecodedBuffer>,
    pub position: usize,
    pub gain: GainRamp,
    /// Frames left before the slot goes silent for good.
    pub stop_after: Option<u64>,
}

impl PlaybackSlot {
    /// Starts at `offset_frames` (wrapped into the buffer) with gain `start_gain`.
    pub fn new(asset_id: impl Into<String>, buffer: Arc<DecodedBuffer>, offset_frames: usize, start_gain: f32) -> Self {
        let frames = buffer.frames().max(1);
        Self {
            asset_id: asset_id.into(),
            buffer,
            position: offset_frames % frames,
            gain: GainRamp::new(start_gain),
            stop_after: None,
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.stop_after == Some(0) || self.buffer.frames() == 0
    }

    /// Ramp to zero over `fade_frames`, then stop `tail_frames` later.
    pub fn stop(&mut self, fade_frames: u64, tail_frames: u64) {
        self.gain.ramp_to(0.0, fade_frames);
        self.stop_after = Some(fade_frames + tail_frames);
    }

    /// Next stereo frame with slot gain applied.
    #[inline]
    pub fn next_frame(&mut self) -> (f32, f32) {
        if self.is_finished() {
            return (0.0, 0.0);
        }
        if let Some(n) = self.stop_after.as_mut() {
            *n -= 1;
        }
        let (l, r) = self.buffer.frame(self.position);
        self.position += 1;
        if self.position >= self.buffer.frames() {
            self.position = 0;
        }
        let g = self.gain.next();
        (l * g, r * g)
    }
}

/// Two-slot crossfading mixer.
#[derive(Debug)]
pub struct Mixer {
    sample_rate: u32,
    device_ready: bool,
    master: GainRamp,
    current: Option<PlaybackSlot>,
    outgoing: Option<PlaybackSlot>,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate: sample_rate.max(1), device_ready: false, master: GainRamp::new(0.0), current: None, outgoing: None }
    }

    #[inline] pub fn sample_rate(&self) -> u32 { self.sample_rate }
    #[inline] pub fn device_ready(&self) -> bool { self.device_ready }
    #[inline] pub fn master(&self) -> &GainRamp { &self.master }
    #[inline] pub fn current(&self) -> Option<&PlaybackSlot> { self.current.as_ref() }
    #[inline] pub fn outgoing(&self) -> Option<&PlaybackSlot> { self.outgoing.as_ref() }
    #[inline] pub fn current_id(&self) -> Option<&str> { self.current.as_ref().map(|s| s.asset_id.as_str()) }

    pub fn active_slots(&self) -> usize {
        usize::from(self.current.is_some()) + usize::from(self.outgoing.is_some())
    }

    /// Host signal that the output device is unlocked. Going not-ready drops all slots.
    pub fn set_device_ready(&mut self, ready: bool) {
        self.device_ready = ready;
        if !ready {
            self.current = None;
            self.outgoing = None;
            self.master.set_now(0.0);
        }
    }

    #[inline]
    pub fn secs_to_frames(&self, secs: f32) -> u64 {
        (secs.max(0.0) * self.sample_rate as f32).round() as u64
    }

    pub fn ramp_master(&mut self, value: f32, secs: f32) {
        if !self.device_ready {
            return;
        }
        let frames = self.secs_to_frames(secs);
        self.master.ramp_to(value.max(0.0), frames);
    }

    /// Replace the current slot outright; the old one fades over `fade_old_secs`.
    pub fn play_now(&mut self, slot: PlaybackSlot, fade_old_secs: f32, tail_secs: f32) {
        if !self.device_ready {
            return;
        }
        self.retire_current(fade_old_secs, tail_secs);
        debug!(asset = %slot.asset_id, "slot playing");
        self.current = Some(slot);
    }

    /// Fade `slot` in from its current gain to unity while the old current fades out.
    pub fn crossfade_to(&mut self, mut slot: PlaybackSlot, secs: f32, tail_secs: f32) {
        if !self.device_ready {
            return;
        }
        slot.gain.ramp_to(1.0, self.secs_to_frames(secs));
        self.retire_current(secs, tail_secs);
        debug!(asset = %slot.asset_id, secs, "crossfade started");
        self.current = Some(slot);
    }

    /// Fade everything out and stop it.
    pub fn fade_out_all(&mut self, secs: f32, tail_secs: f32) {
        if !self.device_ready {
            return;
        }
        if self.current.is_some() {
            self.retire_current(secs, tail_secs);
            return;
        }
        let (fade, tail) = (self.secs_to_frames(secs), self.secs_to_frames(tail_secs));
        if let Some(out) = self.outgoing.as_mut() {
            if out.gain.remaining > fade {
                out.stop(fade, tail);
            }
        }
    }

    /// Move `current` to `outgoing`. At most one fade-out exists: when one is
    /// already running, the quieter of the two slots is dropped and its gain
    /// is folded into the louder one, which then fades from the summed level.
    fn retire_current(&mut self, fade_secs: f32, tail_secs: f32) {
        let Some(old) = self.current.take() else {
            return;
        };
        let mut retiring = match self.outgoing.take() {
            None => old,
            Some(prev) => {
                let summed = (old.gain.value() + prev.gain.value()).min(1.0);
                let (mut keep, dropped) = if old.gain.value() >= prev.gain.value() { (old, prev) } else { (prev, old) };
                debug!(kept = %keep.asset_id, dropped = %dropped.asset_id, gain = summed, "folding superseded slot");
                keep.gain.set_now(summed);
                keep
            }
        };
        retiring.stop(self.secs_to_frames(fade_secs), self.secs_to_frames(tail_secs));
        self.outgoing = Some(retiring);
    }

    /// Fill interleaved stereo `out`. Writes silence when the device is not ready.
    pub fn render(&mut self, out: &mut [f32]) {
        if !self.device_ready {
            out.fill(0.0);
            return;
        }
        for frame in out.chunks_exact_mut(2) {
            let (mut l, mut r) = (0.0, 0.0);
            if let Some(s) = self.current.as_mut() {
                let (a, b) = s.next_frame();
                l += a;
                r += b;
            }
            if let Some(s) = self.outgoing.as_mut() {
                let (a, b) = s.next_frame();
                l += a;
                r += b;
            }
            let g = self.master.next();
            frame[0] = (l * g).clamp(-1.0, 1.0);
            frame[1] = (r * g).clamp(-1.0, 1.0);
        }
        let tail = out.len() % 2;
        if tail == 1 {
            if let Some(last) = out.last_mut() {
                *last = 0.0;
            }
        }
        if self.outgoing.as_ref().is_some_and(PlaybackSlot::is_finished) {
            self.outgoing = None;
        }
        if self.current.as_ref().is_some_and(PlaybackSlot::is_finished) {
            self.current = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dc(level: f32, frames: usize) -> Arc<DecodedBuffer> {
        Arc::new(DecodedBuffer::stereo(1000, vec![level; frames * 2]))
    }

    fn ready_mixer() -> Mixer {
        let mut m = Mixer::new(1000);
        m.set_device_ready(true);
        m.ramp_master(1.0, 0.0);
        m
    }

    #[test]
    fn ramp_is_linear_and_lands_on_target() {
        let mut g = GainRamp::new(0.0);
        g.ramp_to(1.0, 4);
        let v: Vec<f32> = (0..6).map(|_| g.next()).collect();
        assert_abs_diff_eq!(v[0], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(v[1], 0.5, epsilon = 1e-6);
        assert_eq!(v[3], 1.0);
        assert_eq!(v[5], 1.0);
        assert!(g.is_settled());
    }

    #[test]
    fn not_ready_is_silent_and_inert() {
        let mut m = Mixer::new(1000);
        m.play_now(PlaybackSlot::new("a", dc(0.5, 100), 0, 1.0), 1.0, 0.1);
        assert_eq!(m.active_slots(), 0);
        let mut out = vec![1.0; 8];
        m.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn crossfade_keeps_two_slots_then_one() {
        let mut m = ready_mixer();
        m.play_now(PlaybackSlot::new("a", dc(0.4, 100), 0, 1.0), 1.0, 0.1);
        m.crossfade_to(PlaybackSlot::new("b", dc(0.4, 100), 0, 0.0), 0.5, 0.2);
        assert_eq!(m.active_slots(), 2);
        assert_eq!(m.current_id(), Some("b"));

        // equal-sum linear crossfade of identical DC keeps the level
        let mut out = vec![0.0; 2 * 100];
        m.render(&mut out);
        assert!(out.iter().all(|s| (s - 0.4).abs() < 1e-3));

        // fade 500 + tail 200 frames
        let mut rest = vec![0.0; 2 * 700];
        m.render(&mut rest);
        assert_eq!(m.active_slots(), 1);
    }

    #[test]
    fn a_third_slot_keeps_the_louder_fade_out() {
        let mut m = ready_mixer();
        m.play_now(PlaybackSlot::new("a", dc(0.1, 10), 0, 1.0), 1.0, 0.1);
        m.crossfade_to(PlaybackSlot::new("b", dc(0.1, 10), 0, 0.0), 1.0, 0.2);
        m.crossfade_to(PlaybackSlot::new("c", dc(0.1, 10), 0, 0.0), 1.0, 0.2);
        assert_eq!(m.active_slots(), 2);
        assert_eq!(m.current_id(), Some("c"));
        assert_eq!(m.outgoing().map(|s| s.asset_id.as_str()), Some("a"));
    }

    #[test]
    fn back_to_back_crossfades_stay_continuous() {
        let mut m = Mixer::new(1000);
        m.set_device_ready(true);
        m.ramp_master(0.7, 0.0);
        m.play_now(PlaybackSlot::new("a", dc(0.5, 4000), 0, 1.0), 0.0, 0.0);
        m.crossfade_to(PlaybackSlot::new("b", dc(0.5, 4000), 0, 0.0), 2.0, 0.5);

        let mut first = vec![0.0; 2 * 1000];
        m.render(&mut first);
        let before = first[first.len() - 1];
        assert_abs_diff_eq!(before, 0.35, epsilon = 1e-3);

        // halfway through, a second crossfade starts
        m.crossfade_to(PlaybackSlot::new("c", dc(0.5, 4000), 0, 0.0), 2.0, 0.5);
        assert_eq!(m.active_slots(), 2);
        let mut next = vec![0.0; 2 * 1000];
        m.render(&mut next);
        assert!((next[0] - before).abs() < 1e-3);
        for w in next.windows(2) {
            assert!((w[1] - w[0]).abs() < 1e-3);
        }
        assert_abs_diff_eq!(next[next.len() - 1], 0.35, epsilon = 1e-3);
    }

    #[test]
    fn output_is_hard_clamped() {
        let mut m = ready_mixer();
        m.play_now(PlaybackSlot::new("loud", dc(0.9, 10), 0, 1.0), 0.0, 0.0);
        m.crossfade_to(PlaybackSlot::new("loud2", dc(0.9, 10), 0, 1.0), 1.0, 0.2);
        let mut out = vec![0.0; 4];
        m.render(&mut out);
        assert_eq!(out[0], 1.0);
        assert!(out.iter().all(|&s| s <= 1.0));
    }

    #[test]
    fn fade_out_all_empties_the_mixer() {
        let mut m = ready_mixer();
        m.play_now(PlaybackSlot::new("a", dc(0.3, 50), 7, 1.0), 0.5, 0.1);
        m.fade_out_all(0.5, 0.1);
        assert!(m.current().is_none());
        let mut out = vec![0.0; 2 * 600];
        m.render(&mut out);
        assert_eq!(m.active_slots(), 0);
        assert_abs_diff_eq!(out[out.len() - 1], 0.0);
    }
}
