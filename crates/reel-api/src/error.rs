//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use reel_models::{ErrorKind, RequestValidationError};
use reel_storage::StorageError;
use reel_worker::WorkerError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Error kind carried in the `code` field; `None` for plain HTTP errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::NotFound(_) => Some(ErrorKind::NotFound),
            ApiError::BadRequest(_) | ApiError::Worker(WorkerError::InvalidRequest(_)) => None,
            ApiError::Worker(e) => Some(e.kind()),
            ApiError::Storage(e) => Some(e.kind()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Worker(WorkerError::InvalidRequest(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => self
                .kind()
                .map(status_for_kind)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<RequestValidationError> for ApiError {
    fn from(e: RequestValidationError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::SourceUnavailable => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ResourceExceeded => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::UpstreamApiError => StatusCode::BAD_GATEWAY,
        ErrorKind::Corrupt | ErrorKind::ConfigurationError | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            detail,
            code: self.kind().map(|k| k.as_str()).unwrap_or("invalid_request"),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{ArtifactId, ArtifactKind};

    #[test]
    fn test_status_mapping() {
        let id = ArtifactId::from("r1");
        assert_eq!(
            ApiError::from(StorageError::not_found(ArtifactKind::Reel, &id)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StorageError::corrupt(ArtifactKind::Reel, &id, "digest mismatch"))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(WorkerError::invalid_request("no clips")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(WorkerError::source_unavailable("404 from cdn")).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(WorkerError::Processor {
                status: 503,
                kind: ErrorKind::UpstreamApiError,
                detail: "busy".to_string()
            })
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(WorkerError::Processor {
                status: 422,
                kind: ErrorKind::SourceUnavailable,
                detail: "https://cdn/1.mp4: HTTP 404".to_string()
            })
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_code_field() {
        assert_eq!(ApiError::BadRequest("x".to_string()).kind(), None);
        assert_eq!(
            ApiError::from(WorkerError::source_unavailable("gone")).kind(),
            Some(ErrorKind::SourceUnavailable)
        );
    }
}
