//! Progress emission for long-running jobs.
//!
//! A job reports `starting`, any number of `progress` events and exactly one
//! terminal `complete` or `failed` event. [`ProgressEmitter`] enforces that
//! order; the receiving end (an HTTP stream or a log drain) only forwards.

use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use reel_models::{ErrorKind, GenerateReelRequest, JobId, ProgressEvent, ReelResult};

use crate::error::WorkerResult;
use crate::metrics;
use crate::pipeline::ReelPipeline;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("Job already emitted its terminal event")]
    AlreadyTerminated,
}

/// Sending half of a job's progress stream.
///
/// Created with the `starting` event already sent. Dropping an emitter that
/// never reached a terminal event sends `failed` with kind `internal`, so a
/// panicking or abandoned job still closes its stream properly.
#[derive(Debug)]
pub struct ProgressEmitter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    terminated: bool,
    emitted: usize,
}

impl ProgressEmitter {
    /// Open a stream and emit `starting` with `message`.
    pub fn channel(message: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut emitter = Self {
            tx,
            terminated: false,
            emitted: 0,
        };
        emitter.send(ProgressEvent::starting(message));
        (emitter, rx)
    }

    pub fn progress(&mut self, message: impl Into<String>) -> Result<(), EmitError> {
        self.check_open()?;
        self.send(ProgressEvent::progress(message));
        Ok(())
    }

    pub fn complete(&mut self, message: impl Into<String>, result: ReelResult) -> Result<(), EmitError> {
        self.check_open()?;
        self.send(ProgressEvent::complete(message, result));
        Ok(())
    }

    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) -> Result<(), EmitError> {
        self.check_open()?;
        self.send(ProgressEvent::failed(kind, message));
        Ok(())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Events sent so far, `starting` included.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn check_open(&self) -> Result<(), EmitError> {
        if self.terminated {
            Err(EmitError::AlreadyTerminated)
        } else {
            Ok(())
        }
    }

    fn send(&mut self, event: ProgressEvent) {
        self.terminated = event.is_terminal();
        self.emitted += 1;
        // A gone receiver means the client disconnected; the job keeps going.
        if self.tx.send(event).is_err() {
            debug!("Progress receiver dropped");
        }
    }
}

impl Drop for ProgressEmitter {
    fn drop(&mut self) {
        if !self.terminated {
            warn!("Job ended without a terminal event");
            self.send(ProgressEvent::failed(
                ErrorKind::Internal,
                "Job ended without producing a result",
            ));
        }
    }
}

/// Run one reel job to its terminal event.
///
/// Every error is caught here and turned into exactly one `failed` event
/// carrying its kind; the error is also returned to the caller.
pub async fn run_streaming_job(
    pipeline: &ReelPipeline,
    job_id: &JobId,
    request: GenerateReelRequest,
    mut emitter: ProgressEmitter,
) -> WorkerResult<ReelResult> {
    let start = Instant::now();
    let outcome = pipeline.run(job_id, request, &mut emitter).await;

    let terminal = match &outcome {
        Ok(result) => emitter.complete(
            format!(
                "Reel ready: {:.1}s, {:.1} MB",
                result.duration_secs,
                result.file_size_mb()
            ),
            result.clone(),
        ),
        Err(e) => emitter.fail(e.kind(), e.to_string()),
    };
    if let Err(e) = terminal {
        warn!(job_id = %job_id, "Pipeline emitted a terminal event itself: {}", e);
    }

    metrics::record_job(
        outcome.as_ref().err().map(|e| e.kind()),
        start.elapsed().as_secs_f64(),
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{ArtifactId, ArtifactKind, StreamStatus};

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn result() -> ReelResult {
        ReelResult {
            artifact_id: ArtifactId::from("r1"),
            kind: ArtifactKind::Reel,
            size_bytes: 1,
            chunk_count: 1,
            duration_secs: 20.0,
            clips_processed: 3,
            video_base64: None,
        }
    }

    #[test]
    fn test_starting_is_first() {
        let (emitter, mut rx) = ProgressEmitter::channel("Generating reel");
        let first = rx.try_recv().unwrap();
        assert_eq!(first.status, StreamStatus::Starting);
        assert_eq!(first.message, "Generating reel");
        assert_eq!(emitter.emitted(), 1);
        drop(emitter);
        assert_eq!(rx.try_recv().unwrap().status, StreamStatus::Failed);
    }

    #[test]
    fn test_nothing_after_terminal() {
        let (mut emitter, mut rx) = ProgressEmitter::channel("go");
        emitter.progress("step 1").unwrap();
        emitter.complete("done", result()).unwrap();

        assert_eq!(emitter.progress("late"), Err(EmitError::AlreadyTerminated));
        assert_eq!(
            emitter.fail(ErrorKind::Internal, "late"),
            Err(EmitError::AlreadyTerminated)
        );
        drop(emitter);

        let statuses: Vec<StreamStatus> = drain(&mut rx).iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![StreamStatus::Starting, StreamStatus::Progress, StreamStatus::Complete]
        );
    }

    #[test]
    fn test_drop_without_terminal_fails_internal() {
        let (mut emitter, mut rx) = ProgressEmitter::channel("go");
        emitter.progress("step 1").unwrap();
        drop(emitter);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        let last = events.last().unwrap();
        assert_eq!(last.status, StreamStatus::Failed);
        assert_eq!(last.error.as_ref().unwrap().kind, ErrorKind::Internal);
    }

    #[test]
    fn test_disconnected_receiver_does_not_fail_job() {
        let (mut emitter, rx) = ProgressEmitter::channel("go");
        drop(rx);
        assert!(emitter.progress("still running").is_ok());
        assert!(emitter.fail(ErrorKind::SourceUnavailable, "gone").is_ok());
        assert!(emitter.is_terminated());
    }
}
