//! Error types for model invocation.

use std::path::PathBuf;

use pathq_models::TrackError;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model '{model}' failed on frame {frame_idx}: {message}")]
    InvocationFailed {
        model: String,
        frame_idx: u64,
        message: String,
    },

    #[error("Frame {frame_idx} is outside the model's source")]
    FrameOutOfRange { frame_idx: u64 },

    #[error("Detections file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Tracking produced an invalid track: {0}")]
    Track(#[from] TrackError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create an invocation failure error.
    pub fn invocation_failed(
        model: impl Into<String>,
        frame_idx: u64,
        message: impl Into<String>,
    ) -> Self {
        Self::InvocationFailed {
            model: model.into(),
            frame_idx,
            message: message.into(),
        }
    }
}
