//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_sources::SourcesConfig;

/// Reel job configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Base URL of a remote processor; assemble locally when unset
    pub processor_url: Option<String>,
    /// Request timeout for remote processing
    pub processor_timeout: Duration,
    /// Lifetime of intermediate artifacts (narration buffers, processed video)
    pub temp_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/reelsmith"),
            processor_url: None,
            processor_timeout: Duration::from_secs(900),
            temp_ttl: Duration::from_secs(7200), // 2 hours
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/reelsmith")),
            processor_url: std::env::var("PROCESSOR_URL")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            processor_timeout: Duration::from_secs(
                std::env::var("PROCESSOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            temp_ttl: Duration::from_secs(
                std::env::var("TEMP_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(7200),
            ),
        }
    }
}

/// Polling loop configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Time between the starts of two cycles
    pub poll_interval: Duration,
    /// Reels produced at most per cycle
    pub max_reels_per_cycle: usize,
    /// Intermediate artifacts older than this are deleted after each cycle
    pub temp_retention: Duration,
    pub news_section: String,
    pub news_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(720), // 12 minutes
            max_reels_per_cycle: 1,
            temp_retention: Duration::from_secs(7200),
            news_section: "world".to_string(),
            news_limit: 10,
        }
    }
}

impl OrchestratorConfig {
    /// Create config from environment variables; the news feed settings come
    /// from `sources`.
    pub fn from_env(sources: &SourcesConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(
                std::env::var("POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(720),
            ),
            max_reels_per_cycle: std::env::var("MAX_REELS_PER_CYCLE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            temp_retention: Duration::from_secs(
                std::env::var("TEMP_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(7200),
            ),
            news_section: sources.news_section.clone(),
            news_limit: sources.news_limit,
        }
    }
}
