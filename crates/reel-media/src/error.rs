//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use reel_models::ErrorKind;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Source unavailable: {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("Resource limit exceeded: {0}")]
    ResourceExceeded(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a source fetch failure.
    pub fn source_unavailable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn resource_exceeded(message: impl Into<String>) -> Self {
        Self::ResourceExceeded(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classification for streaming failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            MediaError::ResourceExceeded(_) | MediaError::Timeout(_) => ErrorKind::ResourceExceeded,
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => {
                ErrorKind::ConfigurationError
            }
            MediaError::InvalidVideo(_) => ErrorKind::SourceUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}
