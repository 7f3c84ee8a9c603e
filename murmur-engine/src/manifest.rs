//! Asset manifest: a flat, versioned catalog of generated audio assets.
//!
//! Wire shape:
//! ```json
//! { "version": 1,
//!   "tracks": [ { "id": "...", "category": "rain", "layer": "air", "path": "...",
//!                 "durationSeconds": 10, "integratedLoudness": -33.0,
//!                 "tags": [], "features": { "brightness": 0.9 } } ] }
//! ```
//!
//! Parsing validates each track on its own. A malformed entry is dropped and
//! counted; the rest of the catalog survives. Only a document that is not
//! JSON, or lacks `version`/`tracks`, is rejected as a whole.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::{EngineError, Result};

/// Version written by the generation pipeline.
pub const MANIFEST_VERSION: u32 = 1;

/// Mood bucket of the catalog.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Rain,
    Focus,
    Nature,
    Drone,
    Cafe,
    Campfire,
    Forest,
    Ocean,
    Wind,
    Night,
    WhiteNoise,
    Other,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Rain,
        Category::Focus,
        Category::Nature,
        Category::Drone,
        Category::Cafe,
        Category::Campfire,
        Category::Forest,
        Category::Ocean,
        Category::Wind,
        Category::Night,
        Category::WhiteNoise,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Rain => "rain",
            Category::Focus => "focus",
            Category::Nature => "nature",
            Category::Drone => "drone",
            Category::Cafe => "cafe",
            Category::Campfire => "campfire",
            Category::Forest => "forest",
            Category::Ocean => "ocean",
            Category::Wind => "wind",
            Category::Night => "night",
            Category::WhiteNoise => "white_noise",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EngineError::Manifest { reason: format!("unknown category '{s}'") })
    }
}

/// Structural role of an asset within a soundscape.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    #[serde(alias = "foundation")]
    LowBed,
    #[serde(alias = "texture")]
    MidTexture,
    Air,
    Room,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Layer::LowBed, Layer::MidTexture, Layer::Air, Layer::Room];

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::LowBed => "low_bed",
            Layer::MidTexture => "mid_texture",
            Layer::Air => "air",
            Layer::Room => "room",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of the catalog the listener wants.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn accepts(self, c: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(want) => want == c,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "all" {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

impl TryFrom<String> for CategoryFilter {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CategoryFilter> for String {
    fn from(f: CategoryFilter) -> String {
        match f {
            CategoryFilter::All => "all".to_string(),
            CategoryFilter::Only(c) => c.as_str().to_string(),
        }
    }
}

/// Descriptive scores computed at build time, each roughly in [0, 1].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<f64>,
}

impl FeatureScores {
    fn all_finite(&self) -> bool {
        [self.brightness, self.density, self.movement].iter().flatten().all(|v| v.is_finite())
    }
}

/// One generated asset. Immutable once built.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioAsset {
    pub id: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrated_loudness: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub features: FeatureScores,
}

/// Versioned, ordered asset catalog.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Manifest {
    pub version: u32,
    pub tracks: Vec<AudioAsset>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self { version: MANIFEST_VERSION, tracks: Vec::new() }
    }
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AudioAsset> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Tracks accepted by `filter`, in catalog order.
    pub fn filter(&self, filter: CategoryFilter) -> Vec<&AudioAsset> {
        self.tracks.iter().filter(|t| filter.accepts(t.category)).collect()
    }

    /// Remove every track whose id starts with `prefix`; returns how many went.
    pub fn remove_by_prefix(&mut self, prefix: &str) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|t| !t.id.starts_with(prefix));
        before - self.tracks.len()
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut s = serde_json::to_string_pretty(self)?;
        s.push('\n');
        Ok(s)
    }
}

/// Whole-document manifest failures.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("manifest has no integer `version`")]
    MissingVersion,
    #[error("manifest has no `tracks` array")]
    MissingTracks,
}

impl From<ManifestError> for EngineError {
    fn from(e: ManifestError) -> Self {
        EngineError::Manifest { reason: e.to_string() }
    }
}

/// Outcome of a validating parse.
#[derive(Debug)]
pub enum ManifestParse {
    /// Every track was valid.
    Ok(Manifest),
    /// Some tracks were dropped; the remainder is usable.
    Partial { manifest: Manifest, dropped: usize },
    /// Nothing usable.
    Err(ManifestError),
}

impl ManifestParse {
    /// The usable catalog, if any.
    pub fn into_manifest(self) -> Option<Manifest> {
        match self {
            ManifestParse::Ok(m) | ManifestParse::Partial { manifest: m, .. } => Some(m),
            ManifestParse::Err(_) => None,
        }
    }

    pub fn dropped(&self) -> usize {
        match self {
            ManifestParse::Partial { dropped, .. } => *dropped,
            _ => 0,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrack {
    id: String,
    category: Category,
    #[serde(default)]
    layer: Option<Layer>,
    path: String,
    #[serde(default, alias = "duration_sec", alias = "length_sec")]
    duration_seconds: Option<f64>,
    #[serde(default, alias = "lufs_i")]
    integrated_loudness: Option<f64>,
    #[serde(default)]
    tags: Option<Vec<Value>>,
    #[serde(default)]
    features: Option<FeatureScores>,
}

fn validate_track(v: &Value) -> Option<AudioAsset> {
    let raw: RawTrack = serde_json::from_value(v.clone()).ok()?;
    if raw.id.trim().is_empty() || raw.path.trim().is_empty() {
        return None;
    }
    if let Some(d) = raw.duration_seconds {
        if !d.is_finite() || d <= 0.0 {
            return None;
        }
    }
    if raw.integrated_loudness.is_some_and(|l| !l.is_finite()) {
        return None;
    }
    let features = raw.features.unwrap_or_default();
    if !features.all_finite() {
        return None;
    }
    let tags = raw
        .tags
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| t.as_str().map(str::to_owned))
        .collect();
    Some(AudioAsset {
        id: raw.id,
        category: raw.category,
        layer: raw.layer,
        path: raw.path,
        duration_seconds: raw.duration_seconds,
        integrated_loudness: raw.integrated_loudness,
        tags,
        features,
    })
}

/// Validating parse. Duplicate ids keep the first occurrence.
pub fn parse_manifest(text: &str) -> ManifestParse {
    let doc: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return ManifestParse::Err(e.into()),
    };
    let version = match doc.get("version") {
        Some(v) => match v.as_u64().or_else(|| v.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)) {
            Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
            None => return ManifestParse::Err(ManifestError::MissingVersion),
        },
        None => return ManifestParse::Err(ManifestError::MissingVersion),
    };
    let Some(raw_tracks) = doc.get("tracks").and_then(Value::as_array) else {
        return ManifestParse::Err(ManifestError::MissingTracks);
    };

    let mut tracks: Vec<AudioAsset> = Vec::with_capacity(raw_tracks.len());
    let mut dropped = 0;
    for t in raw_tracks {
        match validate_track(t) {
            Some(a) if !tracks.iter().any(|x| x.id == a.id) => tracks.push(a),
            _ => dropped += 1,
        }
    }

    let manifest = Manifest { version, tracks };
    if dropped == 0 {
        ManifestParse::Ok(manifest)
    } else {
        ManifestParse::Partial { manifest, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "version": 1,
        "tracks": [
            {"id": "r1", "category": "rain", "layer": "air", "path": "rain/r1.wav",
             "durationSeconds": 10, "integratedLoudness": -33.0, "tags": ["soft", 3],
             "features": {"brightness": 0.9}, "unknownField": true},
            {"id": "f1", "category": "focus", "path": "focus/f1.wav"}
        ]
    }"#;

    #[test]
    fn parses_a_clean_manifest() {
        let ManifestParse::Ok(m) = parse_manifest(GOOD) else { panic!("expected Ok") };
        assert_eq!(m.version, 1);
        assert_eq!(m.len(), 2);
        let r1 = m.get("r1").unwrap();
        assert_eq!(r1.layer, Some(Layer::Air));
        assert_eq!(r1.tags, vec!["soft".to_string()]);
        assert_eq!(r1.features.brightness, Some(0.9));
        assert_eq!(m.get("f1").unwrap().layer, None);
    }

    #[test]
    fn drops_bad_entries_individually() {
        let text = r#"{"version": 2, "tracks": [
            {"id": "ok", "category": "rain", "path": "a.wav"},
            {"id": "", "category": "rain", "path": "b.wav"},
            {"id": "nopath", "category": "rain"},
            {"id": "badcat", "category": "disco", "path": "c.wav"},
            {"id": "badlayer", "category": "rain", "layer": "ceiling", "path": "d.wav"},
            {"id": "baddur", "category": "rain", "path": "e.wav", "durationSeconds": -1},
            {"id": "ok", "category": "rain", "path": "dup.wav"},
            null
        ]}"#;
        match parse_manifest(text) {
            ManifestParse::Partial { manifest, dropped } => {
                assert_eq!(manifest.len(), 1);
                assert_eq!(manifest.tracks[0].path, "a.wav");
                assert_eq!(dropped, 7);
            }
            other => panic!("expected Partial, got {other:?}"),
        }
    }

    #[test]
    fn whole_document_failures() {
        assert!(matches!(parse_manifest("not json"), ManifestParse::Err(ManifestError::NotJson(_))));
        assert!(matches!(parse_manifest(r#"{"tracks": []}"#), ManifestParse::Err(ManifestError::MissingVersion)));
        assert!(matches!(parse_manifest(r#"{"version": 1}"#), ManifestParse::Err(ManifestError::MissingTracks)));
        assert!(parse_manifest(r#"{"version": 1.5, "tracks": []}"#).into_manifest().is_none());
    }

    #[test]
    fn legacy_field_names_are_accepted() {
        let text = r#"{"version": 1, "tracks": [
            {"id": "x", "title": "X", "category": "ocean", "path": "x.wav", "duration_sec": 12.5, "lufs_i": -30}
        ]}"#;
        let m = parse_manifest(text).into_manifest().unwrap();
        assert_eq!(m.tracks[0].duration_seconds, Some(12.5));
        assert_eq!(m.tracks[0].integrated_loudness, Some(-30.0));
    }

    #[test]
    fn filter_and_prefix_removal() {
        let mut m = parse_manifest(GOOD).into_manifest().unwrap();
        assert_eq!(m.filter(CategoryFilter::Only(Category::Rain)).len(), 1);
        assert_eq!(m.filter(CategoryFilter::All).len(), 2);
        assert_eq!(m.remove_by_prefix("r"), 1);
        assert!(!m.contains("r1"));
    }

    #[test]
    fn round_trips_through_json() {
        let m = parse_manifest(GOOD).into_manifest().unwrap();
        let text = m.to_json_pretty().unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("\"durationSeconds\""));
        let back = parse_manifest(&text).into_manifest().unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn category_filter_strings() {
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!("white_noise".parse::<CategoryFilter>().unwrap(), CategoryFilter::Only(Category::WhiteNoise));
        assert!("jazz".parse::<CategoryFilter>().is_err());
        assert_eq!(String::from(CategoryFilter::Only(Category::Cafe)), "cafe");
    }
}
