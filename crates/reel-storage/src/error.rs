//! Storage error types.

use reel_models::{ArtifactId, ArtifactKind, ErrorKind};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage: {0}")]
    ConfigError(String),

    #[error("Artifact not found: {kind}/{id}")]
    NotFound { kind: ArtifactKind, id: ArtifactId },

    #[error("Artifact {kind}/{id} is corrupt: {reason}")]
    Corrupt {
        kind: ArtifactKind,
        id: ArtifactId,
        reason: String,
    },

    #[error("Invalid chunk size {size}: must be between 1 and {max} bytes")]
    InvalidChunkSize { size: u64, max: u64 },

    #[error("Artifact too large: {0} bytes")]
    TooLarge(u64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(kind: ArtifactKind, id: &ArtifactId) -> Self {
        Self::NotFound {
            kind,
            id: id.clone(),
        }
    }

    pub fn corrupt(kind: ArtifactKind, id: &ArtifactId, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            kind,
            id: id.clone(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }

    /// Whether a retry could succeed.
    ///
    /// Missing or corrupt artifacts stay missing or corrupt.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }

    /// Classification for streaming failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::Corrupt { .. } => ErrorKind::Corrupt,
            StorageError::TooLarge(_) => ErrorKind::ResourceExceeded,
            StorageError::ConfigError(_) | StorageError::InvalidChunkSize { .. } => {
                ErrorKind::ConfigurationError
            }
            StorageError::Database(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let id = ArtifactId::from("a");
        assert_eq!(
            StorageError::not_found(ArtifactKind::Reel, &id).kind(),
            ErrorKind::NotFound
        );
        let corrupt = StorageError::corrupt(ArtifactKind::Reel, &id, "missing chunk 2");
        assert_eq!(corrupt.kind(), ErrorKind::Corrupt);
        assert!(corrupt.to_string().contains("missing chunk 2"));
        assert!(!corrupt.is_retryable());
        assert!(StorageError::Database(sqlx::Error::PoolTimedOut).is_retryable());
    }
}
