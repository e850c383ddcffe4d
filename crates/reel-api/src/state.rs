//! Application state.

use std::sync::Arc;

use tracing::info;

use reel_media::VideoAssembler;
use reel_sources::{StockMediaClient, TtsClient};
use reel_storage::ArtifactStore;
use reel_worker::{ClipProcessor, LocalProcessor, ReelPipeline, RemoteProcessor};

use crate::config::{AppConfig, ConfigError};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ArtifactStore>,
    /// Assembles clips, here or on a processor deployment
    pub processor: Arc<dyn ClipProcessor>,
    /// Present in modes that serve reel jobs
    pub pipeline: Option<Arc<ReelPipeline>>,
}

impl AppState {
    /// Connect the store and wire the processor and pipeline for the
    /// configured deployment mode.
    pub async fn new(config: AppConfig) -> Result<Self, ConfigError> {
        VideoAssembler::check_tools()?;
        tokio::fs::create_dir_all(&config.worker.work_dir).await.map_err(|e| {
            ConfigError::invalid(format!(
                "Cannot create work dir {}: {}",
                config.worker.work_dir.display(),
                e
            ))
        })?;

        let store = config.store.connect().await?;
        let assembler = Arc::new(VideoAssembler::new(
            config.limits.clone(),
            config.worker.work_dir.clone(),
        )?);

        let processor: Arc<dyn ClipProcessor> = if config.mode.processes_locally() {
            Arc::new(LocalProcessor::new(
                Arc::clone(&assembler),
                Arc::clone(&store),
                config.worker.temp_ttl,
            ))
        } else {
            let url = config.worker.processor_url.clone().ok_or_else(|| {
                ConfigError::invalid(format!("PROCESSOR_URL is required in {} mode", config.mode))
            })?;
            Arc::new(RemoteProcessor::new(url, config.worker.processor_timeout)?)
        };
        info!(mode = %config.mode, processor = processor.name(), "Processor ready");

        let pipeline = if config.mode.serves_streaming() {
            Some(Arc::new(ReelPipeline::new(
                Arc::clone(&store),
                Arc::clone(&processor),
                assembler,
                TtsClient::new(&config.sources)?,
                StockMediaClient::new(&config.sources)?,
                &config.worker,
                config.limits.max_clips,
            )))
        } else {
            None
        };

        Ok(Self::from_parts(config, store, processor, pipeline))
    }

    /// Assemble state from already-built components.
    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn ArtifactStore>,
        processor: Arc<dyn ClipProcessor>,
        pipeline: Option<Arc<ReelPipeline>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            processor,
            pipeline,
        }
    }
}
