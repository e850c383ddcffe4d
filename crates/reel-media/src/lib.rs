//! FFmpeg-based video assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Timeout support via tokio
//! - Size-capped source downloads
//! - Centre-crop frame fitting and duration planning
//! - Concatenation of mixed video/photo sources and narration muxing

pub mod assembly;
pub mod command;
pub mod download;
pub mod error;
pub mod frame_fit;
pub mod plan;
pub mod probe;

pub use assembly::{
    AssembledVideo, AssemblyLimits, AssemblySpec, VideoAssembler, DEFAULT_TOLERANCE_SECS,
    OUTPUT_FPS,
};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use download::download_source;
pub use error::{MediaError, MediaResult};
pub use frame_fit::FrameFit;
pub use plan::plan_segments;
pub use probe::{probe_media, probe_video, MediaInfo, VideoStream};
