//! Server and application configuration.

use std::time::Duration;

use thiserror::Error;

use reel_media::{AssemblyLimits, MediaError};
use reel_models::{DeploymentMode, DeploymentModeParseError, ErrorKind};
use reel_sources::{SourceError, SourcesConfig};
use reel_storage::{StorageError, StoreBackend, StoreConfig};
use reel_worker::{OrchestratorConfig, WorkerConfig, WorkerError};

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Idle time on a progress stream before a heartbeat line is sent
    pub heartbeat_interval: Duration,
    pub metrics_enabled: bool,
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            // Inline narration audio can be a few MB of base64
            max_body_size: 10 * 1024 * 1024,
            heartbeat_interval: Duration::from_secs(10),
            metrics_enabled: true,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .or_else(|_| std::env::var("PORT"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            heartbeat_interval: std::env::var("HEARTBEAT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_interval),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }
}

/// Startup failures. The process exits before serving anything.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidMode(#[from] DeploymentModeParseError),

    #[error("Missing required environment variables for {mode} mode: {}", .missing.join(", "))]
    MissingEnv {
        mode: DeploymentMode,
        missing: Vec<&'static str>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Storage(e) => e.kind(),
            ConfigError::Media(e) => e.kind(),
            ConfigError::Source(e) => e.kind(),
            ConfigError::Worker(e) => e.kind(),
            _ => ErrorKind::ConfigurationError,
        }
    }
}

/// Everything one process needs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: DeploymentMode,
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub limits: AssemblyLimits,
    pub sources: SourcesConfig,
    pub worker: WorkerConfig,
    pub orchestrator: OrchestratorConfig,
}

impl AppConfig {
    /// Load from environment variables and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = match std::env::var("DEPLOYMENT_MODE") {
            Ok(value) => value.parse()?,
            Err(_) => DeploymentMode::default(),
        };
        let sources = SourcesConfig::from_env();
        let config = Self {
            mode,
            api: ApiConfig::from_env(),
            store: StoreConfig::from_env()?,
            limits: AssemblyLimits::from_env(),
            orchestrator: OrchestratorConfig::from_env(&sources),
            worker: WorkerConfig::from_env(),
            sources,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the mode's required settings are present and consistent.
    ///
    /// Every missing variable is reported at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&'static str> = self
            .mode
            .required_env()
            .iter()
            .copied()
            .filter(|var| !self.is_set(var))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv {
                mode: self.mode,
                missing,
            });
        }

        // Split deployments hand artifacts over through the store.
        if self.mode != DeploymentMode::Single && self.store.backend == StoreBackend::Memory {
            return Err(ConfigError::invalid(format!(
                "{} mode needs a shared database; set DATABASE_URL",
                self.mode
            )));
        }

        if self.mode.processes_locally() {
            self.limits.validate()?;
        }
        if self.orchestrator.max_reels_per_cycle == 0 {
            return Err(ConfigError::invalid("MAX_REELS_PER_CYCLE must be at least 1"));
        }
        Ok(())
    }

    fn is_set(&self, var: &str) -> bool {
        match var {
            "NYT_API_KEY" => self.sources.news_api_key.is_some(),
            "PEXELS_API_KEY" => self.sources.stock_api_key.is_some(),
            "GOOGLE_TTS_API_KEY" => self.sources.tts_api_key.is_some(),
            "PROCESSOR_URL" => self.worker.processor_url.is_some(),
            other => std::env::var(other).is_ok_and(|v| !v.trim().is_empty()),
        }
    }
}
