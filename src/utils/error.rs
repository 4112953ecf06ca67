//! Error types and handling
//!
//! Session-level failures are surfaced to callers as `RecorderError`.
//! Per-frame failures are absorbed by the pipeline and only counted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recorder-wide error type
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Recorder busy: a recording is already in progress")]
    RecorderBusy,

    #[error("Not recording")]
    NotRecording,

    #[error("Failed to start writer session: {0}")]
    StartFailed(String),

    #[error("Failed to finalize recording: {0}")]
    Finalize(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecorderError {
    /// Stable code for event consumers
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::RecorderBusy => "RECORDER_BUSY",
            RecorderError::NotRecording => "NOT_RECORDING",
            RecorderError::StartFailed(_) => "START_FAILED",
            RecorderError::Finalize(_) => "FINALIZE_FAILED",
            RecorderError::Config(_) => "CONFIG_ERROR",
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Reason a single frame was dropped.
///
/// None of these stop a recording.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameDrop {
    #[error("writer not ready for more data")]
    NotReady,

    #[error("no pixel buffer available")]
    BufferUnavailable,

    #[error("invalid presentation timestamp")]
    InvalidTimestamp,

    #[error("scene render failed")]
    RenderFailed,

    #[error("frame conversion failed")]
    ConversionFailed,

    #[error("writer rejected the frame")]
    AppendRejected,
}

/// Errors reported by a media writer backend
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Invalid writer state: {0}")]
    InvalidState(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(RecorderError::RecorderBusy.code(), "RECORDER_BUSY");
        assert_eq!(RecorderError::NotRecording.code(), "NOT_RECORDING");
        assert_eq!(RecorderError::StartFailed("bad path".into()).code(), "START_FAILED");
    }

    #[test]
    fn test_frame_drop_serializes_camel_case() {
        let json = serde_json::to_string(&FrameDrop::BufferUnavailable).unwrap();
        assert_eq!(json, "\"bufferUnavailable\"");
    }
}
