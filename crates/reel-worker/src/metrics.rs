//! Metrics for reel jobs and the polling loop.

use metrics::{counter, histogram};
use reel_models::ErrorKind;

pub mod names {
    pub const REEL_JOBS_TOTAL: &str = "reel_jobs_total";
    pub const REEL_JOB_DURATION: &str = "reel_job_duration_seconds";
    pub const ASSEMBLY_DURATION: &str = "reel_assembly_duration_seconds";
    pub const ASSEMBLY_CLIPS: &str = "reel_assembly_clips_total";
    pub const ORCHESTRATOR_CYCLES_TOTAL: &str = "reel_orchestrator_cycles_total";
    pub const ORCHESTRATOR_ARTICLES_SKIPPED: &str = "reel_orchestrator_articles_skipped_total";
}

/// Record a finished reel job; `failure` is `None` on success.
pub fn record_job(failure: Option<ErrorKind>, secs: f64) {
    let (status, kind) = match failure {
        None => ("complete", "none"),
        Some(kind) => ("failed", kind.as_str()),
    };
    counter!(names::REEL_JOBS_TOTAL, "status" => status, "kind" => kind).increment(1);
    histogram!(names::REEL_JOB_DURATION, "status" => status).record(secs);
}

pub fn record_assembly(processor: &'static str, clips: u32, secs: f64) {
    histogram!(names::ASSEMBLY_DURATION, "processor" => processor).record(secs);
    counter!(names::ASSEMBLY_CLIPS, "processor" => processor).increment(clips as u64);
}

pub fn record_cycle(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(names::ORCHESTRATOR_CYCLES_TOTAL, "status" => status).increment(1);
}

pub fn record_skipped(count: u64) {
    counter!(names::ORCHESTRATOR_ARTICLES_SKIPPED).increment(count);
}
