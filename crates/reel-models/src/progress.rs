//! Streaming progress event types.
//!
//! One event is serialized per line (NDJSON) so clients can act on each
//! record as it arrives.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ErrorKind, JobFailure, ReelResult};

/// Status tag of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Starting,
    Progress,
    Complete,
    Failed,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Starting => "starting",
            StreamStatus::Progress => "progress",
            StreamStatus::Complete => "complete",
            StreamStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamStatus::Complete | StreamStatus::Failed)
    }
}

/// A single step of a job as seen by a streaming client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    pub status: StreamStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Present only on `complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ReelResult>,
    /// Present only on `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl ProgressEvent {
    /// Create a starting event.
    pub fn starting(message: impl Into<String>) -> Self {
        Self::bare(StreamStatus::Starting, message)
    }

    /// Create a progress event.
    pub fn progress(message: impl Into<String>) -> Self {
        Self::bare(StreamStatus::Progress, message)
    }

    /// Create a terminal complete event.
    pub fn complete(message: impl Into<String>, result: ReelResult) -> Self {
        Self {
            result: Some(result),
            ..Self::bare(StreamStatus::Complete, message)
        }
    }

    /// Create a terminal failed event.
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            error: Some(JobFailure::new(kind, message.clone())),
            ..Self::bare(StreamStatus::Failed, message)
        }
    }

    fn bare(status: StreamStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: Utc::now(),
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Serialize as one newline-terminated JSON line.
    pub fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArtifactId, ArtifactKind};

    #[test]
    fn test_terminal_statuses() {
        assert!(!StreamStatus::Starting.is_terminal());
        assert!(!StreamStatus::Progress.is_terminal());
        assert!(StreamStatus::Complete.is_terminal());
        assert!(StreamStatus::Failed.is_terminal());
    }

    #[test]
    fn test_ndjson_line_is_single_line() {
        let event = ProgressEvent::progress("Fetching media clips...\nsecond line");
        let line = event.to_ndjson_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let parsed: ProgressEvent = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed.status, StreamStatus::Progress);
    }

    #[test]
    fn test_failed_event_carries_kind() {
        let event = ProgressEvent::failed(ErrorKind::SourceUnavailable, "clip 3 unreachable");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "source_unavailable");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_complete_event_carries_result() {
        let event = ProgressEvent::complete(
            "Reel ready",
            ReelResult {
                artifact_id: ArtifactId::from("r1"),
                kind: ArtifactKind::Reel,
                size_bytes: 10,
                chunk_count: 1,
                duration_secs: 25.0,
                clips_processed: 4,
                video_base64: Some("AAAA".to_string()),
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["result"]["artifact_id"], "r1");
        assert!(json.get("error").is_none());
    }
}
