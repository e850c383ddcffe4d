//! Structured job logging utilities.

use tracing::{error, info, warn, Span};

use reel_models::{JobId, ProgressEvent, StreamStatus};

/// Job logger for structured logging with consistent formatting.
///
/// Every line carries the job ID and operation so one reel can be followed
/// through the polling loop's output.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    /// Log a streaming progress event at the level its status deserves.
    pub fn log_event(&self, event: &ProgressEvent) {
        match event.status {
            StreamStatus::Starting => self.log_start(&event.message),
            StreamStatus::Progress => self.log_progress(&event.message),
            StreamStatus::Complete => self.log_completion(&event.message),
            StreamStatus::Failed => {
                let kind = event.error.as_ref().map(|e| e.kind.as_str()).unwrap_or("internal");
                self.log_error(&format!("[{}] {}", kind, event.message));
            }
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::ErrorKind;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "reel");

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.operation(), "reel");
    }

    #[test]
    fn test_log_event_accepts_every_status() {
        let logger = JobLogger::new(&JobId::from_string("job-1"), "reel");
        logger.log_event(&ProgressEvent::starting("go"));
        logger.log_event(&ProgressEvent::progress("working"));
        logger.log_event(&ProgressEvent::failed(ErrorKind::Corrupt, "missing chunk 1"));
    }
}
