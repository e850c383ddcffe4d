//! Job identity and outcome models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{ArtifactId, ArtifactKind};

/// Unique identifier for a reel job invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error classification carried by a `failed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An input media/audio/text fetch failed
    SourceUnavailable,
    /// Stored chunk set is inconsistent with its manifest
    Corrupt,
    /// Requested artifact is absent
    NotFound,
    /// Memory/time/size ceiling hit during assembly
    ResourceExceeded,
    /// A control-plane dependency returned a non-success response
    UpstreamApiError,
    /// Missing or invalid configuration
    ConfigurationError,
    /// Anything else
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::Corrupt => "corrupt",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ResourceExceeded => "resource_exceeded",
            ErrorKind::UpstreamApiError => "upstream_api_error",
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure payload of a terminal `failed` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result payload of a terminal `complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReelResult {
    pub artifact_id: ArtifactId,
    pub kind: ArtifactKind,
    pub size_bytes: u64,
    pub chunk_count: u32,
    pub duration_secs: f64,
    pub clips_processed: u32,
    /// Whole video, base64 encoded, when the client asked for it inline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_base64: Option<String>,
}

impl ReelResult {
    pub fn file_size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_unique() {
        assert_ne!(JobId::new(), JobId::new());
        assert_eq!(JobId::from_string("abc").as_str(), "abc");
    }

    #[test]
    fn test_error_kind_wire_names() {
        let json = serde_json::to_string(&ErrorKind::UpstreamApiError).unwrap();
        assert_eq!(json, "\"upstream_api_error\"");
        assert_eq!(ErrorKind::SourceUnavailable.to_string(), "source_unavailable");
    }

    #[test]
    fn test_reel_result_omits_absent_payload() {
        let result = ReelResult {
            artifact_id: ArtifactId::from("a1"),
            kind: ArtifactKind::Reel,
            size_bytes: 3 * 1024 * 1024,
            chunk_count: 1,
            duration_secs: 24.0,
            clips_processed: 6,
            video_base64: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("video_base64").is_none());
        assert!((result.file_size_mb() - 3.0).abs() < f64::EPSILON);
    }
}
