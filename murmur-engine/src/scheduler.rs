//! Timer source for the player.
//!
//! The player never sleeps. It asks a [`Scheduler`] for one-shot timers and
//! collects the expired ones from [`Scheduler::take_due`] during `poll()`.
//! [`ManualScheduler`] runs on a virtual clock for offline renders and tests;
//! [`SystemScheduler`] reads the wall clock.

use chrono::Utc;

/// What a timer is for. The player keeps at most one pending handle per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Rotation,
    DuckRestore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

pub trait Scheduler: Send {
    /// Milliseconds on this scheduler's clock.
    fn now_ms(&self) -> i64;
    fn schedule(&mut self, delay_ms: u64, kind: TimerKind) -> TimerHandle;
    /// Unknown or already fired handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
    /// Remove and return every timer due at `now_ms()`, earliest first.
    fn take_due(&mut self) -> Vec<(TimerHandle, TimerKind)>;
}

#[derive(Debug, Default, Clone)]
struct TimerQueue {
    next_id: u64,
    // (handle, due_ms, kind)
    entries: Vec<(TimerHandle, i64, TimerKind)>,
}

impl TimerQueue {
    fn schedule(&mut self, now_ms: i64, delay_ms: u64, kind: TimerKind) -> TimerHandle {
        self.next_id += 1;
        let h = TimerHandle(self.next_id);
        let delay = i64::try_from(delay_ms).unwrap_or(i64::MAX);
        self.entries.push((h, now_ms.saturating_add(delay), kind));
        h
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.entries.retain(|(h, _, _)| *h != handle);
    }

    fn take_due(&mut self, now_ms: i64) -> Vec<(TimerHandle, TimerKind)> {
        let mut due: Vec<_> = self.entries.iter().copied().filter(|(_, at, _)| *at <= now_ms).collect();
        self.entries.retain(|(_, at, _)| *at > now_ms);
        due.sort_by_key(|(h, at, _)| (*at, h.0));
        due.into_iter().map(|(h, _, k)| (h, k)).collect()
    }

    fn next_due(&self) -> Option<i64> {
        self.entries.iter().map(|(_, at, _)| *at).min()
    }
}

/// Virtual clock advanced explicitly by the host.
#[derive(Debug, Default, Clone)]
pub struct ManualScheduler {
    now: i64,
    queue: TimerQueue,
}

impl ManualScheduler {
    pub fn new(start_ms: i64) -> Self {
        Self { now: start_ms, queue: TimerQueue::default() }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now = self.now.saturating_add(i64::try_from(ms).unwrap_or(i64::MAX));
    }

    pub fn pending(&self) -> usize {
        self.queue.entries.len()
    }

    pub fn next_due_ms(&self) -> Option<i64> {
        self.queue.next_due()
    }
}

impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> i64 {
        self.now
    }

    fn schedule(&mut self, delay_ms: u64, kind: TimerKind) -> TimerHandle {
        self.queue.schedule(self.now, delay_ms, kind)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.queue.cancel(handle);
    }

    fn take_due(&mut self) -> Vec<(TimerHandle, TimerKind)> {
        self.queue.take_due(self.now)
    }
}

/// Wall clock (Unix milliseconds).
#[derive(Debug, Default, Clone)]
pub struct SystemScheduler {
    queue: TimerQueue,
}

impl SystemScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for SystemScheduler {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn schedule(&mut self, delay_ms: u64, kind: TimerKind) -> TimerHandle {
        let now = self.now_ms();
        self.queue.schedule(now, delay_ms, kind)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.queue.cancel(handle);
    }

    fn take_due(&mut self) -> Vec<(TimerHandle, TimerKind)> {
        let now = self.now_ms();
        self.queue.take_due(now)
    }
}
