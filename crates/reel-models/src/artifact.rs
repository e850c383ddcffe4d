//! Artifact identity and manifest models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a stored media artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    /// Generate a new random artifact ID.
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

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ArtifactId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Table family an artifact lives in.
///
/// Each kind maps to a manifest table plus a chunk table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Concatenated, normalized video produced by the processor
    ProcessedVideo,
    /// Final composed reel with narration
    Reel,
    /// Short-lived buffer subject to time-based cleanup
    TempClip,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::ProcessedVideo,
        ArtifactKind::Reel,
        ArtifactKind::TempClip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::ProcessedVideo => "processed_video",
            ArtifactKind::Reel => "reel",
            ArtifactKind::TempClip => "temp_clip",
        }
    }

    /// Manifest table name.
    pub fn manifest_table(&self) -> &'static str {
        match self {
            ArtifactKind::ProcessedVideo => "processed_videos",
            ArtifactKind::Reel => "reels",
            ArtifactKind::TempClip => "temp_clips",
        }
    }

    /// Chunk table name.
    pub fn chunk_table(&self) -> &'static str {
        match self {
            ArtifactKind::ProcessedVideo => "processed_video_chunks",
            ArtifactKind::Reel => "reel_chunks",
            ArtifactKind::TempClip => "temp_clip_chunks",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown artifact kind: {0}")]
pub struct ArtifactKindParseError(pub String);

impl FromStr for ArtifactKind {
    type Err = ArtifactKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed_video" | "processed_videos" | "processed" => Ok(ArtifactKind::ProcessedVideo),
            "reel" | "reels" => Ok(ArtifactKind::Reel),
            "temp_clip" | "temp_clips" | "temp" => Ok(ArtifactKind::TempClip),
            other => Err(ArtifactKindParseError(other.to_string())),
        }
    }
}

/// Kind of media held by an artifact or clip source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[default]
    Video,
    Photo,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Photo => "photo",
            MediaType::Audio => "audio",
        }
    }

    /// File extension used for work files of this type.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Video => "mp4",
            MediaType::Photo => "jpg",
            MediaType::Audio => "mp3",
        }
    }

    /// Content type served for this media.
    pub fn content_type(&self) -> &'static str {
        match self {
            MediaType::Video => "video/mp4",
            MediaType::Photo => "image/jpeg",
            MediaType::Audio => "audio/mpeg",
        }
    }

    /// Parse the stored column value, defaulting to video.
    pub fn from_column(s: &str) -> Self {
        match s {
            "photo" => MediaType::Photo,
            "audio" => MediaType::Audio,
            _ => MediaType::Video,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manifest describing a chunked artifact.
///
/// A reader only trusts chunk data when the chunk set matches
/// `chunk_count`, `total_size` and `sha256`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactManifest {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    /// Total size in bytes
    pub total_size: u64,
    /// Number of chunks written
    pub chunk_count: u32,
    /// Chunk size limit in effect when the artifact was written
    pub chunk_size: u32,
    /// Hex SHA-256 of the full byte stream
    pub sha256: String,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// External reference (e.g. the article URL a reel was made from)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ArtifactManifest {
    /// Size in megabytes, for logging.
    pub fn size_mb(&self) -> f64 {
        self.total_size as f64 / (1024.0 * 1024.0)
    }

    /// Whether the manifest is due for cleanup at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_names() {
        for kind in ArtifactKind::ALL {
            assert_eq!(kind.as_str().parse::<ArtifactKind>().unwrap(), kind);
            assert!(kind.chunk_table().ends_with("_chunks"));
        }
        assert!("videos".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ArtifactKind::ProcessedVideo).unwrap();
        assert_eq!(json, "\"processed_video\"");
    }

    #[test]
    fn test_media_type_from_column() {
        assert_eq!(MediaType::from_column("photo"), MediaType::Photo);
        assert_eq!(MediaType::from_column("audio"), MediaType::Audio);
        assert_eq!(MediaType::from_column("anything"), MediaType::Video);
    }

    #[test]
    fn test_manifest_expiry() {
        let now = Utc::now();
        let mut manifest = ArtifactManifest {
            id: ArtifactId::new(),
            kind: ArtifactKind::TempClip,
            total_size: 0,
            chunk_count: 0,
            chunk_size: 1024,
            sha256: String::new(),
            media_type: MediaType::Video,
            session_id: None,
            source_ref: None,
            duration_secs: None,
            created_at: now,
            expires_at: None,
        };
        assert!(!manifest.is_expired(now));

        manifest.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(manifest.is_expired(now));
    }
}
