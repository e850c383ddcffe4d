//! The polling loop: fetch top stories, make reels, clean up, sleep.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use reel_models::{ArtifactKind, JobId};
use reel_sources::{NewsClient, SourceError};
use reel_storage::StorageResult;

use crate::config::OrchestratorConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::ReelPipeline;
use crate::progress::{run_streaming_job, ProgressEmitter};
use crate::retry::{retry_async, FailureTracker, RetryConfig};
use crate::scheduler::{Clock, Scheduler, SystemClock};

/// Kinds holding intermediates subject to time-based cleanup.
const EXPIRING_KINDS: [ArtifactKind; 2] = [ArtifactKind::TempClip, ArtifactKind::ProcessedVideo];

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub skipped: usize,
    pub produced: usize,
    pub failed: usize,
    pub expired_deleted: u64,
}

/// Sequential polling loop. One job at a time, never overlapping cycles.
pub struct Orchestrator {
    config: OrchestratorConfig,
    news: NewsClient,
    pipeline: Arc<ReelPipeline>,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, news: NewsClient, pipeline: Arc<ReelPipeline>) -> Self {
        Self {
            config,
            news,
            pipeline,
            clock: Arc::new(SystemClock),
            retry: RetryConfig::new("top_stories"),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run until `shutdown` flips to `true`.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        self.drive(shutdown, None).await;
    }

    async fn drive(&self, mut shutdown: watch::Receiver<bool>, max_cycles: Option<usize>) {
        let mut scheduler = Scheduler::new(self.config.poll_interval);
        let mut failures = FailureTracker::new(3);
        let mut cycles = 0usize;

        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            section = %self.config.news_section,
            max_reels = self.config.max_reels_per_cycle,
            "Orchestrator started"
        );

        loop {
            let delay = scheduler.delay(self.clock.now());
            if !delay.is_zero() {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            info!("Shutdown sender dropped, stopping orchestrator");
                            break;
                        }
                    }
                    _ = self.clock.sleep(delay) => {}
                }
            }
            if *shutdown.borrow() {
                info!("Shutdown signal received, stopping orchestrator");
                break;
            }

            scheduler.record_run(self.clock.now());
            match self.run_cycle().await {
                Ok(report) => {
                    failures.record_success();
                    metrics::record_cycle(true);
                    info!(
                        fetched = report.fetched,
                        skipped = report.skipped,
                        produced = report.produced,
                        failed = report.failed,
                        expired_deleted = report.expired_deleted,
                        "Cycle complete"
                    );
                }
                Err(e) => {
                    metrics::record_cycle(false);
                    if failures.record_failure() {
                        warn!("Cycle failed, waiting for the next one: {}", e);
                    }
                }
            }

            cycles += 1;
            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
        }
    }

    /// One poll: fetch, skip already-made reels, produce, clean up.
    ///
    /// Only failures that stop the whole cycle (news feed or store down) are
    /// returned; a failing reel is logged and counted.
    pub async fn run_cycle(&self) -> WorkerResult<CycleReport> {
        let articles = retry_async(&self.retry, SourceError::is_retryable, || {
            self.news
                .top_stories(&self.config.news_section, self.config.news_limit)
        })
        .await
        .into_result()?;

        let mut report = CycleReport {
            fetched: articles.len(),
            ..CycleReport::default()
        };
        let store = self.pipeline.store();

        for article in articles {
            if report.produced + report.failed >= self.config.max_reels_per_cycle {
                break;
            }
            if store
                .find_by_source_ref(ArtifactKind::Reel, &article.url)
                .await?
                .is_some()
            {
                report.skipped += 1;
                continue;
            }

            let job_id = JobId::new();
            let logger = JobLogger::new(&job_id, "reel");
            let (emitter, mut events) =
                ProgressEmitter::channel(format!("Generating reel: {}", article.title));
            let drain = {
                let logger = logger.clone();
                tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        logger.log_event(&event);
                    }
                })
            };

            let outcome =
                run_streaming_job(&self.pipeline, &job_id, article.to_reel_request(), emitter).await;
            if drain.await.is_err() {
                logger.log_warning("Progress log task ended abnormally");
            }

            match outcome {
                Ok(_) => report.produced += 1,
                Err(_) => report.failed += 1,
            }
        }

        metrics::record_skipped(report.skipped as u64);
        report.expired_deleted = match self.cleanup().await {
            Ok(n) => n,
            Err(e) => {
                warn!("Expired artifact cleanup failed: {}", e);
                0
            }
        };
        Ok(report)
    }

    /// Delete intermediates older than the retention window.
    pub async fn cleanup(&self) -> StorageResult<u64> {
        let retention = chrono::Duration::from_std(self.config.temp_retention)
            .unwrap_or(chrono::Duration::MAX);
        let older_than = self
            .clock
            .now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let mut deleted = 0;
        for kind in EXPIRING_KINDS {
            deleted += self.pipeline.store().delete_expired(kind, older_than).await?;
        }
        Ok(deleted)
    }
}
