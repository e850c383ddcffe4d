//! Upstream API configuration.

use std::time::Duration;

use crate::error::{SourceError, SourceResult};

pub const DEFAULT_NEWS_BASE_URL: &str = "https://api.nytimes.com";
pub const DEFAULT_STOCK_BASE_URL: &str = "https://api.pexels.com";
pub const DEFAULT_TTS_BASE_URL: &str = "https://texttospeech.googleapis.com";
pub const DEFAULT_TTS_VOICE: &str = "en-US-Neural2-J";

/// Keys and endpoints for the news, narration and stock media services.
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    pub news_api_key: Option<String>,
    pub news_base_url: String,
    pub news_section: String,
    pub news_limit: usize,
    pub stock_api_key: Option<String>,
    pub stock_base_url: String,
    pub tts_api_key: Option<String>,
    pub tts_base_url: String,
    pub tts_voice: String,
    pub request_timeout: Duration,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            news_api_key: None,
            news_base_url: DEFAULT_NEWS_BASE_URL.to_string(),
            news_section: "world".to_string(),
            news_limit: 10,
            stock_api_key: None,
            stock_base_url: DEFAULT_STOCK_BASE_URL.to_string(),
            tts_api_key: None,
            tts_base_url: DEFAULT_TTS_BASE_URL.to_string(),
            tts_voice: DEFAULT_TTS_VOICE.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.trim().is_empty())
}

impl SourcesConfig {
    /// Load from environment variables. Missing keys stay `None`; callers
    /// decide which ones their deployment mode requires.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            news_api_key: non_empty("NYT_API_KEY"),
            news_base_url: non_empty("NEWS_BASE_URL").unwrap_or(defaults.news_base_url),
            news_section: non_empty("NEWS_SECTION").unwrap_or(defaults.news_section),
            news_limit: std::env::var("NEWS_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.news_limit),
            stock_api_key: non_empty("PEXELS_API_KEY"),
            stock_base_url: non_empty("STOCK_BASE_URL").unwrap_or(defaults.stock_base_url),
            tts_api_key: non_empty("GOOGLE_TTS_API_KEY"),
            tts_base_url: non_empty("TTS_BASE_URL").unwrap_or(defaults.tts_base_url),
            tts_voice: non_empty("TTS_VOICE").unwrap_or(defaults.tts_voice),
            request_timeout: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }

    pub(crate) fn http_client(&self) -> SourceResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| SourceError::config_error(format!("Failed to build HTTP client: {}", e)))
    }
}

pub(crate) fn require_key(key: &Option<String>, var: &str) -> SourceResult<String> {
    key.clone()
        .ok_or_else(|| SourceError::config_error(format!("{} not set", var)))
}
