//! Shared data models for the reelsmith services.
//!
//! This crate provides Serde-serializable types for:
//! - Artifact identity, kinds and manifests
//! - Streaming progress events and job outcomes
//! - Processor and reel job requests
//! - Output frame geometry
//! - Deployment mode selection

pub mod artifact;
pub mod deployment;
pub mod frame;
pub mod job;
pub mod progress;
pub mod request;

// Re-export common types
pub use artifact::{ArtifactId, ArtifactKind, ArtifactKindParseError, ArtifactManifest, MediaType};
pub use deployment::{DeploymentMode, DeploymentModeParseError};
pub use frame::{AspectRatio, AspectRatioParseError, TargetFrame};
pub use job::{ErrorKind, JobFailure, JobId, ReelResult};
pub use progress::{ProgressEvent, StreamStatus};
pub use request::{
    ClipSource, GenerateReelRequest, ProcessClipsRequest, ProcessClipsResponse,
    RequestValidationError,
};
