//! Error handling for the engine.
//!
//! Errors propagate with `?` through the generation pipeline and the loaders.
//! The [`Player`](crate::player::Player) catches them at its boundary: a failed
//! load degrades to silence or to a smaller candidate pool, never a panic.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid manifest: {reason}")]
    Manifest { reason: String },

    #[error("Cannot decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Asset not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Unknown profile: {name}")]
    UnknownProfile { name: String },
}

impl EngineError {
    /// Stable short code, used in log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Io(_) => "IO_ERROR",
            EngineError::Json(_) => "JSON_ERROR",
            EngineError::Wav(_) => "WAV_ERROR",
            EngineError::Manifest { .. } => "INVALID_MANIFEST",
            EngineError::Decode { .. } => "DECODE_FAILED",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::UnknownProfile { .. } => "UNKNOWN_PROFILE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = EngineError::UnknownProfile { name: "lofi".to_string() };
        assert_eq!(err.error_code(), "UNKNOWN_PROFILE");
        assert_eq!(err.to_string(), "Unknown profile: lofi");
    }

    #[test]
    fn decode_errors_name_the_path() {
        let err = EngineError::Decode { path: "a.wav".into(), reason: "truncated".into() };
        assert_eq!(err.error_code(), "DECODE_FAILED");
        assert_eq!(err.to_string(), "Cannot decode a.wav: truncated");
    }
}
