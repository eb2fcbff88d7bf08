//! Error types for Cadence.

use thiserror::Error;

/// Result type alias using Cadence's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Cadence.
#[derive(Error, Debug)]
pub enum Error {
    // Cue errors
    #[error("Audio cue has no clips: {0}")]
    EmptyCue(String),

    // Asset errors
    #[error("Failed to load asset: {0}")]
    AssetLoad(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    // Engine errors
    #[error("Emitter pool exhausted (max {max} emitters)")]
    PoolExhausted { max: usize },

    #[error("Audio channel closed: {0}")]
    ChannelClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error must surface to the caller instead of being
    /// absorbed by the channel that hit it.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::EmptyCue(_))
    }

    /// Returns true if this error came from the asset loader.
    pub const fn is_asset_error(&self) -> bool {
        matches!(self, Self::AssetLoad(_) | Self::AssetNotFound(_))
    }
}
