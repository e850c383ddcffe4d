//! Errors from upstream control-plane APIs.

use reqwest::StatusCode;
use thiserror::Error;

use reel_models::ErrorKind;

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{service} returned {status}: {body}")]
    Http {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned nothing usable: {message}")]
    Empty {
        service: &'static str,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SourceError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn empty(service: &'static str, message: impl Into<String>) -> Self {
        Self::Empty {
            service,
            message: message.into(),
        }
    }

    pub fn decode(service: &'static str, message: impl ToString) -> Self {
        Self::Decode {
            service,
            message: message.to_string(),
        }
    }

    pub fn transport(service: &'static str, err: reqwest::Error) -> Self {
        Self::Transport {
            service,
            message: err.to_string(),
        }
    }

    /// Build from a non-success response, keeping a short body excerpt.
    pub async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::Http {
            service,
            status,
            body: body.chars().take(200).collect(),
        }
    }

    /// Rate limits, server errors and transport failures are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            SourceError::Transport { .. } => true,
            _ => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Config(_) => ErrorKind::ConfigurationError,
            _ => ErrorKind::UpstreamApiError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> SourceError {
        SourceError::Http {
            service: "news",
            status: StatusCode::from_u16(status).unwrap(),
            body: String::new(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(http(429).is_retryable());
        assert!(http(503).is_retryable());
        assert!(!http(401).is_retryable());
        assert!(!http(404).is_retryable());
        assert!(!SourceError::decode("tts", "bad base64").is_retryable());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(http(500).kind(), ErrorKind::UpstreamApiError);
        assert_eq!(
            SourceError::config_error("NYT_API_KEY not set").kind(),
            ErrorKind::ConfigurationError
        );
    }
}
