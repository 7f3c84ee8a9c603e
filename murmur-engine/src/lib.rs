//! Murmur Engine — asset generation and the runtime ambient player.
//!
//! Crate layout:
//! - [`profiles`]  : mood profiles and their per-layer synthesizers
//! - [`generate`]  : offline pipeline writing WAVs + `manifest.json`
//! - [`manifest`]  : catalog types and tolerant parsing
//! - [`loader`]    : `AssetLoader` trait, filesystem and in-memory loaders
//! - [`cache`]     : small LRU for decoded buffers
//! - [`history`]   : persisted play history and candidate selection
//! - [`scheduler`] : cancellable timers on a real or virtual clock
//! - [`mixer`]     : two-slot crossfading mixer with a master gain ramp
//! - [`player`]    : the state machine tying it all together
//! - [`config`]    : player tuning and listener preferences
//!
//! The player is single-threaded and cooperative: host calls enqueue work and
//! return, [`Player::poll`](player::Player::poll) runs it, and
//! [`Player::render`](player::Player::render) is the only thing the audio
//! callback needs.

pub mod cache;
pub mod config;
pub mod error;
pub mod generate;
pub mod history;
pub mod loader;
pub mod manifest;
pub mod mixer;
pub mod player;
pub mod profiles;
pub mod scheduler;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use config::{effective_volume, PlayerConfig, PreferenceSnapshot, MAX_VOLUME};
pub use error::{EngineError, Result};
pub use generate::{generate, GenerateOptions, GenerateReport};
pub use history::{JsonFileStore, MemoryStore, PlayHistory};
pub use loader::{AssetLoader, DecodedBuffer, FsLoader, MemoryLoader};
pub use manifest::{AudioAsset, Category, CategoryFilter, Layer, Manifest};
pub use player::{Player, PlayerState, PlayerStatus};
pub use profiles::{Profile, SynthSpec};
pub use scheduler::{ManualScheduler, Scheduler, SystemScheduler, TimerKind};
