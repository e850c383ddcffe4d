//! Request/response payloads exchanged between roles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ArtifactId, MediaType};

/// Default portrait frame.
pub const DEFAULT_TARGET_WIDTH: u32 = 1080;
pub const DEFAULT_TARGET_HEIGHT: u32 = 1920;

/// Default reel length in seconds.
pub const DEFAULT_TARGET_DURATION: f64 = 30.0;
pub const MIN_TARGET_DURATION: f64 = 5.0;
pub const MAX_TARGET_DURATION: f64 = 180.0;

/// Default number of stock clips per reel.
pub const DEFAULT_CLIP_COUNT: u32 = 6;

/// Default per-clip duration when a source does not say.
pub const DEFAULT_CLIP_DURATION: f64 = 3.0;

const MAX_HEADLINE_LENGTH: usize = 500;
const MAX_COMMENTARY_LENGTH: usize = 5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} is out of range: {message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },

    #[error("Field {0} is too long")]
    TooLong(&'static str),
}

/// Job submission for the streaming reel endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateReelRequest {
    pub headline: String,
    pub commentary: String,
    /// Pre-rendered narration, base64 encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_audio_base64: Option<String>,
    /// Article image shown as the first clip
    #[serde(default, alias = "nyt_image_url", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default = "default_target_duration")]
    pub target_duration: f64,
    #[serde(default = "default_clip_count")]
    pub clip_count: u32,
    /// Inline the finished video in the `complete` event
    #[serde(default)]
    pub include_video: bool,
    /// External reference recorded on the stored reel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
}

fn default_target_duration() -> f64 {
    DEFAULT_TARGET_DURATION
}

fn default_clip_count() -> u32 {
    DEFAULT_CLIP_COUNT
}

impl GenerateReelRequest {
    /// Build a request from a headline and commentary with defaults elsewhere.
    pub fn new(headline: impl Into<String>, commentary: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
            commentary: commentary.into(),
            voice_audio_base64: None,
            image_url: None,
            target_duration: DEFAULT_TARGET_DURATION,
            clip_count: DEFAULT_CLIP_COUNT,
            include_video: false,
            source_ref: None,
        }
    }

    /// Check field presence and ranges; `max_clips` comes from assembly limits.
    pub fn validate(&self, max_clips: u32) -> Result<(), RequestValidationError> {
        if self.headline.trim().is_empty() {
            return Err(RequestValidationError::MissingField("headline"));
        }
        if self.commentary.trim().is_empty() {
            return Err(RequestValidationError::MissingField("commentary"));
        }
        if self.headline.len() > MAX_HEADLINE_LENGTH {
            return Err(RequestValidationError::TooLong("headline"));
        }
        if self.commentary.len() > MAX_COMMENTARY_LENGTH {
            return Err(RequestValidationError::TooLong("commentary"));
        }
        if !(MIN_TARGET_DURATION..=MAX_TARGET_DURATION).contains(&self.target_duration) {
            return Err(RequestValidationError::OutOfRange {
                field: "target_duration",
                message: format!(
                    "{} not in {}..={}",
                    self.target_duration, MIN_TARGET_DURATION, MAX_TARGET_DURATION
                ),
            });
        }
        if self.clip_count == 0 || self.clip_count > max_clips {
            return Err(RequestValidationError::OutOfRange {
                field: "clip_count",
                message: format!("{} not in 1..={}", self.clip_count, max_clips),
            });
        }
        Ok(())
    }
}

/// One source clip handed to the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipSource {
    pub url: String,
    #[serde(rename = "type", default)]
    pub media_type: MediaType,
    /// Seconds available in the source (photos: requested display time)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl ClipSource {
    pub fn video(url: impl Into<String>, duration: Option<f64>) -> Self {
        Self {
            url: url.into(),
            media_type: MediaType::Video,
            duration,
        }
    }

    pub fn photo(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            media_type: MediaType::Photo,
            duration: None,
        }
    }
}

/// Processor request: download, normalize and concatenate clips.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessClipsRequest {
    pub clips: Vec<ClipSource>,
    #[serde(default = "default_target_width")]
    pub target_width: u32,
    #[serde(default = "default_target_height")]
    pub target_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

fn default_target_width() -> u32 {
    DEFAULT_TARGET_WIDTH
}

fn default_target_height() -> u32 {
    DEFAULT_TARGET_HEIGHT
}

impl ProcessClipsRequest {
    pub fn new(clips: Vec<ClipSource>) -> Self {
        Self {
            clips,
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            target_duration: None,
            session_id: None,
        }
    }

    /// Target duration, falling back to the sum of declared clip durations.
    pub fn effective_target_duration(&self) -> f64 {
        self.target_duration.unwrap_or_else(|| {
            self.clips
                .iter()
                .map(|c| c.duration.unwrap_or(DEFAULT_CLIP_DURATION))
                .sum()
        })
    }

    pub fn validate(&self, max_clips: u32) -> Result<(), RequestValidationError> {
        if self.clips.is_empty() {
            return Err(RequestValidationError::MissingField("clips"));
        }
        if self.clips.len() as u32 > max_clips {
            return Err(RequestValidationError::OutOfRange {
                field: "clips",
                message: format!("{} clips, at most {} allowed", self.clips.len(), max_clips),
            });
        }
        if self.target_width == 0 || self.target_height == 0 {
            return Err(RequestValidationError::OutOfRange {
                field: "target_width/target_height",
                message: "frame dimensions must be non-zero".to_string(),
            });
        }
        if self.target_width % 2 != 0 || self.target_height % 2 != 0 {
            return Err(RequestValidationError::OutOfRange {
                field: "target_width/target_height",
                message: "frame dimensions must be even for yuv420p".to_string(),
            });
        }
        if let Some(index) = self
            .clips
            .iter()
            .position(|c| c.media_type == MediaType::Audio)
        {
            return Err(RequestValidationError::OutOfRange {
                field: "clips",
                message: format!("clip {} is audio, only video and photo are supported", index),
            });
        }
        Ok(())
    }
}

/// Processor response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessClipsResponse {
    pub video_id: ArtifactId,
    pub duration: f64,
    pub size_bytes: u64,
    pub chunk_count: u32,
    pub clips_processed: u32,
    pub within_tolerance: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_defaults_from_json() {
        let req: GenerateReelRequest = serde_json::from_str(
            r#"{"headline":"Storm hits coast","commentary":"A storm","nyt_image_url":"https://img/x.jpg"}"#,
        )
        .unwrap();
        assert_eq!(req.target_duration, DEFAULT_TARGET_DURATION);
        assert_eq!(req.clip_count, DEFAULT_CLIP_COUNT);
        assert_eq!(req.image_url.as_deref(), Some("https://img/x.jpg"));
        assert!(!req.include_video);
        assert!(req.validate(8).is_ok());
    }

    #[test]
    fn test_generate_request_requires_text() {
        let req = GenerateReelRequest::new("  ", "commentary");
        assert_eq!(
            req.validate(8),
            Err(RequestValidationError::MissingField("headline"))
        );

        let req = GenerateReelRequest::new("headline", "");
        assert_eq!(
            req.validate(8),
            Err(RequestValidationError::MissingField("commentary"))
        );
    }

    #[test]
    fn test_generate_request_range_checks() {
        let mut req = GenerateReelRequest::new("h", "c");
        req.target_duration = 1.0;
        assert!(matches!(
            req.validate(8),
            Err(RequestValidationError::OutOfRange { field: "target_duration", .. })
        ));

        req.target_duration = 30.0;
        req.clip_count = 9;
        assert!(matches!(
            req.validate(8),
            Err(RequestValidationError::OutOfRange { field: "clip_count", .. })
        ));
    }

    #[test]
    fn test_process_request_wire_format() {
        let req: ProcessClipsRequest = serde_json::from_str(
            r#"{"clips":[{"url":"https://a/1.mp4","type":"video","duration":3.6},{"url":"https://a/2.jpg","type":"photo"}]}"#,
        )
        .unwrap();
        assert_eq!(req.target_width, 1080);
        assert_eq!(req.target_height, 1920);
        assert_eq!(req.clips[1].media_type, MediaType::Photo);
        assert!((req.effective_target_duration() - 6.6).abs() < 1e-9);
        assert!(req.validate(6).is_ok());
    }

    #[test]
    fn test_process_request_rejects_bad_input() {
        assert!(ProcessClipsRequest::new(vec![]).validate(6).is_err());

        let mut req = ProcessClipsRequest::new(vec![ClipSource::video("https://a/1.mp4", None)]);
        req.target_width = 1081;
        assert!(req.validate(6).is_err());

        let many = (0..7)
            .map(|i| ClipSource::video(format!("https://a/{}.mp4", i), None))
            .collect();
        assert!(ProcessClipsRequest::new(many).validate(6).is_err());
    }
}
