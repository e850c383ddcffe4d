//! Reel production.
//!
//! This crate provides:
//! - Clip processors (in-process assembly or a remote processor service)
//! - The reel job pipeline: narration, stock media, assembly, composition
//! - Progress emission with a strict starting/progress/terminal order
//! - The sequential polling orchestrator and its scheduler
//! - Retry with backoff for transient upstream failures

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod retry;
pub mod scheduler;

pub use config::{OrchestratorConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::{CycleReport, Orchestrator};
pub use pipeline::{ReelComposer, ReelPipeline};
pub use processor::{ClipProcessor, LocalProcessor, RemoteProcessor};
pub use progress::{run_streaming_job, EmitError, ProgressEmitter};
pub use retry::{retry_async, FailureTracker, RetryConfig, RetryResult};
pub use scheduler::{delay_until, next_run_at, Clock, Scheduler, SystemClock};
