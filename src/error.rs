//! Error types for the wake word handoff

use thiserror::Error;

/// Result type alias for handoff operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while coordinating the speech engines
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Model or dictionary assets missing or unwritable
    #[error("asset error: {0}")]
    Asset(String),

    /// Underlying engine rejected its configuration
    #[error("engine configuration error: {0}")]
    EngineConfig(String),

    /// Wake word engine error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// Dictation recognition error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// The handoff event queue is gone
    #[error("handoff closed")]
    Closed,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Wrap an IO failure on an asset path
    #[must_use]
    pub fn asset(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::Asset(format!("{}: {err}", path.display()))
    }
}
