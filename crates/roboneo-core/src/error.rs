//! Error types for RoboNeo

use thiserror::Error;

/// Core RoboNeo errors
#[derive(Error, Debug)]
pub enum FaceError {
    // Asset errors
    #[error("Asset error for {asset}: {reason}")]
    Asset { asset: String, reason: String },

    // Expression errors
    #[error("Unknown expression: {0}")]
    UnknownExpression(String),

    // Playback errors
    #[error("Playback failed: {0}")]
    Playback(String),

    // Link errors
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Invalid codec configuration: {0}")]
    InvalidCodec(String),

    #[error("Payload size mismatch: expected {expected}, got {actual}")]
    PayloadSize { expected: usize, actual: usize },

    // Application errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Display error: {0}")]
    Display(String),
}

impl FaceError {
    /// Build an asset error for the named asset
    pub fn asset(asset: impl Into<String>, reason: impl ToString) -> Self {
        FaceError::Asset {
            asset: asset.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is a transient link fault the caller may retry past
    pub fn is_channel(&self) -> bool {
        matches!(self, FaceError::Channel(_))
    }
}

/// Result type for RoboNeo operations
pub type FaceResult<T> = Result<T, FaceError>;
