//! Worker error types.

use thiserror::Error;

use reel_models::ErrorKind;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Processor returned {status}: {detail}")]
    Processor {
        status: u16,
        kind: ErrorKind,
        detail: String,
    },

    #[error("Processor request failed: {0}")]
    ProcessorTransport(String),

    #[error("Progress stream error: {0}")]
    Emit(#[from] crate::progress::EmitError),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Upstream error: {0}")]
    Source(#[from] reel_sources::SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Transient upstream failures only. Missing or corrupt artifacts and
    /// media failures are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Processor { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            WorkerError::ProcessorTransport(_) => true,
            WorkerError::Source(e) => e.is_retryable(),
            WorkerError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Classification carried by the terminal `failed` event.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::ConfigError(_) => ErrorKind::ConfigurationError,
            WorkerError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            WorkerError::Processor { kind, .. } => *kind,
            WorkerError::ProcessorTransport(_) => ErrorKind::UpstreamApiError,
            WorkerError::Storage(e) => e.kind(),
            WorkerError::Media(e) => e.kind(),
            WorkerError::Source(e) => e.kind(),
            WorkerError::InvalidRequest(_)
            | WorkerError::Emit(_)
            | WorkerError::Io(_) => ErrorKind::Internal,
        }
    }
}
