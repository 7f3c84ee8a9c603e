//! Play history and the anti-repetition picker.
//!
//! Two granularities:
//! - [`PlayHistory`]: durable, newest first, capped, one record per id.
//! - [`SessionHistory`]: in-memory list of ids played since the player was built.
//!
//! [`select_candidate`] prefers an asset that is neither current, nor among the
//! last `min(n / 2, 20)` durable plays, nor in the session list. If nothing
//! qualifies it falls back to anything but the current asset.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::manifest::AudioAsset;

pub const HISTORY_CAP: usize = 200;

/// Upper bound on the durable-history window used by the picker.
pub const MAX_HISTORY_WINDOW: usize = 20;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HistoryRecord {
    #[serde(rename = "id")]
    pub asset_id: String,
    #[serde(rename = "atMs")]
    pub played_at_ms: i64,
}

impl HistoryRecord {
    fn is_valid(&self) -> bool {
        !self.asset_id.is_empty() && self.played_at_ms > 0
    }
}

/// Durable backing for [`PlayHistory`].
pub trait HistoryStore: Send {
    fn load(&self) -> Result<Vec<HistoryRecord>>;
    fn save(&mut self, records: &[HistoryRecord]) -> Result<()>;
}

/// Volatile store, for tests and hosts without a writable disk.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub records: Vec<HistoryRecord>,
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Result<Vec<HistoryRecord>> {
        Ok(self.records.clone())
    }

    fn save(&mut self, records: &[HistoryRecord]) -> Result<()> {
        self.records = records.to_vec();
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedHistory<'a> {
    recent_tracks: &'a [HistoryRecord],
}

/// `{"recentTracks": [{"id": "...", "atMs": 123}]}` on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    /// Missing or corrupt files read as empty; invalid records are skipped.
    fn load(&self) -> Result<Vec<HistoryRecord>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let Ok(doc) = serde_json::from_str::<Value>(&text) else {
            warn!(path = %self.path.display(), "history file is corrupt, starting empty");
            return Ok(Vec::new());
        };
        let records = doc
            .get("recentTracks")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value::<HistoryRecord>(v.clone()).ok())
                    .filter(HistoryRecord::is_valid)
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    fn save(&mut self, records: &[HistoryRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string(&PersistedHistory { recent_tracks: records })?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Cross-session record of recent plays.
pub struct PlayHistory {
    records: Vec<HistoryRecord>,
    cap: usize,
    store: Box<dyn HistoryStore>,
}

impl std::fmt::Debug for PlayHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayHistory").field("records", &self.records.len()).field("cap", &self.cap).finish()
    }
}

impl PlayHistory {
    /// Load from `store`. A failing store yields an empty history.
    pub fn open(store: Box<dyn HistoryStore>, cap: usize) -> Self {
        let cap = cap.max(1);
        let mut records = store.load().unwrap_or_else(|e| {
            warn!(error = %e, code = e.error_code(), "could not load play history");
            Vec::new()
        });
        records.retain(HistoryRecord::is_valid);
        records.truncate(cap);
        Self { records, cap, store }
    }

    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryStore::default()), HISTORY_CAP)
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `id` is among the newest `n` records.
    pub fn played_among_last(&self, id: &str, n: usize) -> bool {
        self.records.iter().take(n).any(|r| r.asset_id == id)
    }

    /// Whether `id` was played at or after `now_ms - window_ms`.
    pub fn played_within(&self, id: &str, window_ms: i64, now_ms: i64) -> bool {
        let cutoff = now_ms - window_ms.max(0);
        self.records.iter().any(|r| r.asset_id == id && r.played_at_ms >= cutoff)
    }

    /// Move `id` to the front with a fresh timestamp and persist.
    /// Persistence failures are logged and otherwise ignored.
    pub fn note_played(&mut self, id: &str, now_ms: i64) {
        self.records.retain(|r| r.asset_id != id);
        self.records.insert(0, HistoryRecord { asset_id: id.to_string(), played_at_ms: now_ms.max(1) });
        self.records.truncate(self.cap);
        if let Err(e) = self.store.save(&self.records) {
            warn!(error = %e, code = e.error_code(), "could not persist play history");
        }
    }
}

/// Ids played since the player was constructed.
#[derive(Debug, Default, Clone)]
pub struct SessionHistory {
    ids: Vec<String>,
}

impl SessionHistory {
    pub fn push(&mut self, id: &str) {
        self.ids.push(id.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|x| x == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// History window for a pool of `n` candidates.
pub fn history_window(n: usize) -> usize {
    (n / 2).min(MAX_HISTORY_WINDOW)
}

/// Pick one of `candidates` per the freshness policy.
pub fn select_candidate<'a, R: Rng + ?Sized>(
    candidates: &[&'a AudioAsset],
    current: Option<&str>,
    history: &PlayHistory,
    session: &SessionHistory,
    rng: &mut R,
) -> Option<&'a AudioAsset> {
    select_excluding(candidates, current, history, session, &HashSet::new(), rng)
}

/// Like [`select_candidate`], ignoring ids in `rejected` entirely.
pub fn select_excluding<'a, R: Rng + ?Sized>(
    candidates: &[&'a AudioAsset],
    current: Option<&str>,
    history: &PlayHistory,
    session: &SessionHistory,
    rejected: &HashSet<String>,
    rng: &mut R,
) -> Option<&'a AudioAsset> {
    let pool: Vec<&'a AudioAsset> = candidates.iter().copied().filter(|a| !rejected.contains(&a.id)).collect();
    if pool.is_empty() {
        return None;
    }
    let window = history_window(pool.len());
    let is_current = |a: &AudioAsset| current == Some(a.id.as_str());

    let fresh: Vec<&'a AudioAsset> = pool
        .iter()
        .copied()
        .filter(|a| !is_current(a) && !history.played_among_last(&a.id, window) && !session.contains(&a.id))
        .collect();

    let chosen_from = if !fresh.is_empty() {
        fresh
    } else if pool.len() > 1 {
        debug!(pool = pool.len(), "no fresh candidate, falling back to anything but current");
        let rest: Vec<_> = pool.iter().copied().filter(|a| !is_current(a)).collect();
        if rest.is_empty() {
            pool
        } else {
            rest
        }
    } else {
        pool
    };
    let idx = rng.gen_range(0..chosen_from.len());
    chosen_from.get(idx).copied()
}
