//! Clients for the control-plane APIs feeding the reel pipeline.
//!
//! - [`NewsClient`]: top stories, one reel per article
//! - [`TtsClient`]: narration audio
//! - [`StockMediaClient`]: portrait stock video and photos
//!
//! Every failure here classifies as an upstream API error, except missing
//! keys which are configuration errors.

pub mod config;
pub mod error;
pub mod keywords;
pub mod news;
pub mod stock;
pub mod tts;

pub use config::SourcesConfig;
pub use error::{SourceError, SourceResult};
pub use keywords::{extract_keywords, MAX_KEYWORDS};
pub use news::{Article, Multimedia, NewsClient};
pub use stock::{StockClip, StockMediaClient};
pub use tts::TtsClient;
