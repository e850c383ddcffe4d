//! The reel job: narration, stock media, assembly, composition.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use tracing::{info, warn};

use reel_media::{AssembledVideo, VideoAssembler};
use reel_models::{
    ArtifactId, ArtifactKind, ClipSource, GenerateReelRequest, JobId, MediaType,
    ProcessClipsRequest, ReelResult,
};
use reel_sources::{extract_keywords, SourceError, StockMediaClient, TtsClient};
use reel_storage::{ArtifactStore, PutOptions};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::processor::ClipProcessor;
use crate::progress::ProgressEmitter;
use crate::retry::{retry_async, RetryConfig};

/// Final composition step: put narration under a processed video.
#[async_trait]
pub trait ReelComposer: Send + Sync {
    async fn compose(&self, video: Bytes, narration: Bytes) -> WorkerResult<AssembledVideo>;
}

#[async_trait]
impl ReelComposer for VideoAssembler {
    async fn compose(&self, video: Bytes, narration: Bytes) -> WorkerResult<AssembledVideo> {
        Ok(self.compose_reel(video, narration).await?)
    }
}

/// Runs one reel job end to end against the store.
pub struct ReelPipeline {
    store: Arc<dyn ArtifactStore>,
    processor: Arc<dyn ClipProcessor>,
    composer: Arc<dyn ReelComposer>,
    tts: TtsClient,
    stock: StockMediaClient,
    retry: RetryConfig,
    max_clips: u32,
    temp_ttl: Duration,
}

impl ReelPipeline {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        processor: Arc<dyn ClipProcessor>,
        composer: Arc<dyn ReelComposer>,
        tts: TtsClient,
        stock: StockMediaClient,
        config: &WorkerConfig,
        max_clips: u32,
    ) -> Self {
        Self {
            store,
            processor,
            composer,
            tts,
            stock,
            retry: RetryConfig::default(),
            max_clips,
            temp_ttl: config.temp_ttl,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn max_clips(&self) -> u32 {
        self.max_clips
    }

    /// Produce a reel for `request`, reporting each step on `emitter`.
    ///
    /// Does not emit the terminal event; see
    /// [`run_streaming_job`](crate::progress::run_streaming_job).
    pub async fn run(
        &self,
        job_id: &JobId,
        request: GenerateReelRequest,
        emitter: &mut ProgressEmitter,
    ) -> WorkerResult<ReelResult> {
        request
            .validate(self.max_clips)
            .map_err(|e| WorkerError::invalid_request(e.to_string()))?;
        let session = job_id.to_string();

        // 1. Narration
        emitter.progress("Preparing narration...")?;
        let narration = self.narration(&request).await?;
        let narration_options = PutOptions {
            media_type: MediaType::Audio,
            ..PutOptions::default()
        }
        .with_session(session.clone())
        .with_ttl(self.temp_ttl);
        self.store
            .put(
                ArtifactKind::TempClip,
                &ArtifactId::new(),
                narration.clone(),
                narration_options,
            )
            .await?;
        emitter.progress(format!(
            "Narration ready ({:.0} KB)",
            narration.len() as f64 / 1024.0
        ))?;

        // 2. Media
        let keywords = extract_keywords(&request.headline, &request.commentary);
        emitter.progress(format!("Searching stock media for: {}", keywords.join(", ")))?;
        let clips = self.collect_clips(&request, &keywords).await?;

        // 3. Assembly
        emitter.progress(format!(
            "Assembling {} clips with the {} processor...",
            clips.len(),
            self.processor.name()
        ))?;
        let mut process = ProcessClipsRequest::new(clips);
        process.target_duration = Some(request.target_duration);
        process.session_id = Some(session.clone());
        let processed = retry_async(
            &self.retry.named("process_clips"),
            WorkerError::is_retryable,
            || self.processor.process(process.clone()),
        )
        .await
        .into_result()?;
        if !processed.within_tolerance {
            emitter.progress(format!(
                "Video runs {:.1}s against a {:.1}s target",
                processed.duration, request.target_duration
            ))?;
        }

        // 4. Composition
        emitter.progress("Adding narration...")?;
        let video = self
            .store
            .get(ArtifactKind::ProcessedVideo, &processed.video_id)
            .await?;
        let reel = self.composer.compose(video, narration).await?;

        let reel_id = ArtifactId::new();
        let mut options = PutOptions::video()
            .with_duration(reel.duration)
            .with_session(session.clone());
        if let Some(source_ref) = &request.source_ref {
            options = options.with_source_ref(source_ref.clone());
        }
        let manifest = self
            .store
            .put(ArtifactKind::Reel, &reel_id, reel.data.clone(), options)
            .await?;
        emitter.progress(format!(
            "Reel stored in {} chunks",
            manifest.chunk_count
        ))?;

        self.cleanup(&session, &processed.video_id).await;

        // 5. Result
        info!(
            job_id = %job_id,
            artifact_id = %reel_id,
            duration = reel.duration,
            size_mb = format!("{:.1}", manifest.size_mb()),
            "Reel complete"
        );
        Ok(ReelResult {
            artifact_id: reel_id,
            kind: ArtifactKind::Reel,
            size_bytes: manifest.total_size,
            chunk_count: manifest.chunk_count,
            duration_secs: reel.duration,
            clips_processed: processed.clips_processed,
            video_base64: request
                .include_video
                .then(|| base64::engine::general_purpose::STANDARD.encode(&reel.data)),
        })
    }

    async fn narration(&self, request: &GenerateReelRequest) -> WorkerResult<Bytes> {
        if let Some(encoded) = &request.voice_audio_base64 {
            let audio = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| {
                    WorkerError::source_unavailable(format!("voice_audio_base64 is not valid base64: {}", e))
                })?;
            if audio.is_empty() {
                return Err(WorkerError::source_unavailable("voice_audio_base64 is empty"));
            }
            return Ok(Bytes::from(audio));
        }

        let audio = retry_async(
            &self.retry.named("synthesize"),
            SourceError::is_retryable,
            || self.tts.synthesize(&request.commentary),
        )
        .await
        .into_result()?;
        Ok(audio)
    }

    /// Article image first, then stock clips up to `clip_count`.
    async fn collect_clips(
        &self,
        request: &GenerateReelRequest,
        keywords: &[String],
    ) -> WorkerResult<Vec<ClipSource>> {
        let limit = request.clip_count as usize;
        let mut clips = Vec::with_capacity(limit);
        if let Some(url) = &request.image_url {
            clips.push(ClipSource::photo(url.clone()));
        }

        let wanted = limit.saturating_sub(clips.len());
        if wanted > 0 {
            let found = retry_async(
                &self.retry.named("stock_search"),
                SourceError::is_retryable,
                || self.stock.find_clips(keywords, wanted),
            )
            .await
            .into_result();
            match found {
                Ok(found) => clips.extend(found),
                Err(e) if !clips.is_empty() => {
                    warn!("Stock media search failed, using the article image only: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        clips.truncate(limit);
        Ok(clips)
    }

    /// Drop intermediates. Failures only log; expiry catches leftovers.
    async fn cleanup(&self, session: &str, processed: &ArtifactId) {
        if let Err(e) = self.store.delete(ArtifactKind::ProcessedVideo, processed).await {
            warn!(artifact_id = %processed, "Failed to delete processed video: {}", e);
        }
        match self.store.delete_session(ArtifactKind::TempClip, session).await {
            Ok(n) if n > 0 => info!(session, deleted = n, "Temp buffers removed"),
            Ok(_) => {}
            Err(e) => warn!(session, "Failed to delete temp buffers: {}", e),
        }
    }
}
