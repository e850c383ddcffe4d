//! HTTP surface of reelsmith.
//!
//! One router for every deployment mode: health and artifact download
//! everywhere, `POST /generate-reel` where reel jobs are served and
//! `POST /process-clips` where video is assembled.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, AppConfig, ConfigError};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
