//! The artifact store interface and its configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use reel_models::{ArtifactId, ArtifactKind, ArtifactManifest, MediaType};

use crate::chunking::{ChunkingConfig, DEFAULT_CHUNK_SIZE};
use crate::error::{StorageError, StorageResult};
use crate::memory::MemoryArtifactStore;
use crate::postgres::PgArtifactStore;

/// Metadata recorded alongside a stored artifact.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub media_type: MediaType,
    pub session_id: Option<String>,
    pub source_ref: Option<String>,
    pub duration_secs: Option<f64>,
    /// Mark the artifact for cleanup after this long.
    pub ttl: Option<Duration>,
}

impl PutOptions {
    pub fn video() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub(crate) fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| now + ttl)
    }
}

/// Aggregate numbers for one table family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub artifact_count: u64,
    pub total_bytes: u64,
    pub chunk_count: u64,
}

/// Chunked blob store.
///
/// Writers publish a manifest and all of its chunks atomically. Readers
/// either see a complete artifact or get [`StorageError::NotFound`] /
/// [`StorageError::Corrupt`]; they never see a partial byte stream.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `data` under `id`, replacing any previous artifact with that id.
    async fn put(
        &self,
        kind: ArtifactKind,
        id: &ArtifactId,
        data: Bytes,
        options: PutOptions,
    ) -> StorageResult<ArtifactManifest>;

    /// Reassemble and verify the artifact.
    async fn get(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<Bytes>;

    /// Read the manifest only.
    async fn manifest(&self, kind: ArtifactKind, id: &ArtifactId)
        -> StorageResult<ArtifactManifest>;

    /// Delete one artifact. Returns whether it existed.
    async fn delete(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<bool>;

    /// Delete every artifact written for a session.
    async fn delete_session(&self, kind: ArtifactKind, session_id: &str) -> StorageResult<u64>;

    /// Delete artifacts created before `older_than` or past their expiry.
    async fn delete_expired(
        &self,
        kind: ArtifactKind,
        older_than: DateTime<Utc>,
    ) -> StorageResult<u64>;

    /// Find the newest artifact recorded for an external reference.
    async fn find_by_source_ref(
        &self,
        kind: ArtifactKind,
        source_ref: &str,
    ) -> StorageResult<Option<ArtifactManifest>>;

    async fn stats(&self, kind: ArtifactKind) -> StorageResult<StoreStats>;

    /// Create tables if they do not exist.
    async fn ensure_schema(&self) -> StorageResult<()>;

    /// Backend name for health output.
    fn backend_name(&self) -> &'static str;
}

/// Which backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    fn parse(s: &str) -> StorageResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "cockroach" | "cockroachdb" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(StorageError::config_error(format!(
                "Unknown STORE_BACKEND '{}', expected postgres or memory",
                other
            ))),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub chunking: ChunkingConfig,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            chunking: ChunkingConfig::default(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl StoreConfig {
    /// Load from environment variables.
    ///
    /// Without `STORE_BACKEND` the backend is Postgres when a database URL is
    /// set and in-memory otherwise.
    pub fn from_env() -> StorageResult<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("COCKROACHDB_URI"))
            .ok()
            .filter(|s| !s.trim().is_empty());

        let backend = match std::env::var("STORE_BACKEND") {
            Ok(value) => StoreBackend::parse(&value)?,
            Err(_) if database_url.is_some() => StoreBackend::Postgres,
            Err(_) => StoreBackend::Memory,
        };

        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(StorageError::config_error(
                "DATABASE_URL (or COCKROACHDB_URI) is required for the postgres store",
            ));
        }

        let chunk_size = match std::env::var("CHUNK_SIZE_BYTES") {
            Ok(value) => value.parse::<u64>().map_err(|_| {
                StorageError::config_error(format!("CHUNK_SIZE_BYTES is not a number: {}", value))
            })?,
            Err(_) => DEFAULT_CHUNK_SIZE as u64,
        };

        Ok(Self {
            backend,
            database_url,
            chunking: ChunkingConfig::new(chunk_size)?,
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            acquire_timeout: Duration::from_secs(
                std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }

    /// Open the configured backend and make sure its tables exist.
    pub async fn connect(&self) -> StorageResult<Arc<dyn ArtifactStore>> {
        let store: Arc<dyn ArtifactStore> = match self.backend {
            StoreBackend::Memory => Arc::new(MemoryArtifactStore::new(self.chunking)),
            StoreBackend::Postgres => {
                let url = self.database_url.as_deref().ok_or_else(|| {
                    StorageError::config_error("DATABASE_URL is required for the postgres store")
                })?;
                Arc::new(PgArtifactStore::connect(url, self).await?)
            }
        };
        store.ensure_schema().await?;
        info!(
            backend = store.backend_name(),
            chunk_size = self.chunking.chunk_size(),
            "Artifact store ready"
        );
        Ok(store)
    }
}
