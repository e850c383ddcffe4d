//! Postgres / CockroachDB artifact store.
//!
//! Each [`ArtifactKind`] owns a manifest table and a chunk table:
//!
//! ```text
//! processed_videos(artifact_id PK, total_size, chunk_count, chunk_size, sha256, ...)
//! processed_video_chunks(artifact_id, chunk_index, data BYTEA, PK(artifact_id, chunk_index))
//! ```
//!
//! Writes replace chunks and upsert the manifest in one transaction. Reads
//! run in a REPEATABLE READ transaction so the manifest and chunks come from
//! the same snapshot.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use reel_models::{ArtifactId, ArtifactKind, ArtifactManifest, MediaType};

use crate::chunking::{digest_hex, expected_chunk_count, reassemble, split_chunks, ChunkingConfig};
use crate::error::{StorageError, StorageResult};
use crate::metrics;
use crate::store::{ArtifactStore, PutOptions, StoreConfig, StoreStats};

const MANIFEST_COLUMNS: &str = "artifact_id, total_size, chunk_count, chunk_size, sha256, \
     media_type, session_id, source_ref, duration_secs, created_at, expires_at";

#[derive(Debug, sqlx::FromRow)]
struct ManifestRow {
    artifact_id: String,
    total_size: i64,
    chunk_count: i32,
    chunk_size: i32,
    sha256: String,
    media_type: String,
    session_id: Option<String>,
    source_ref: Option<String>,
    duration_secs: Option<f64>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl ManifestRow {
    fn into_manifest(self, kind: ArtifactKind) -> StorageResult<ArtifactManifest> {
        let id = ArtifactId::from(self.artifact_id);
        if self.total_size < 0 || self.chunk_count < 0 || self.chunk_size <= 0 {
            return Err(StorageError::corrupt(
                kind,
                &id,
                "manifest has negative size fields",
            ));
        }
        Ok(ArtifactManifest {
            id,
            kind,
            total_size: self.total_size as u64,
            chunk_count: self.chunk_count as u32,
            chunk_size: self.chunk_size as u32,
            sha256: self.sha256,
            media_type: MediaType::from_column(&self.media_type),
            session_id: self.session_id,
            source_ref: self.source_ref,
            duration_secs: self.duration_secs,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

/// Artifact store backed by a Postgres-compatible database.
#[derive(Clone)]
pub struct PgArtifactStore {
    pool: PgPool,
    chunking: ChunkingConfig,
}

impl PgArtifactStore {
    /// Connect a pool using the store config.
    pub async fn connect(url: &str, config: &StoreConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(url)
            .await?;
        info!(max_connections = config.max_connections, "Connected to artifact database");
        Ok(Self::from_pool(pool, config.chunking))
    }

    pub fn from_pool(pool: PgPool, chunking: ChunkingConfig) -> Self {
        Self { pool, chunking }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn read(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<Bytes> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, ManifestRow>(&format!(
            "SELECT {} FROM {} WHERE artifact_id = $1",
            MANIFEST_COLUMNS,
            kind.manifest_table()
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StorageError::not_found(kind, id))?;
        let manifest = row.into_manifest(kind)?;

        let rows: Vec<(i32, Vec<u8>)> = sqlx::query_as(&format!(
            "SELECT chunk_index, data FROM {} WHERE artifact_id = $1 ORDER BY chunk_index",
            kind.chunk_table()
        ))
        .bind(id.as_str())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut chunks = Vec::with_capacity(rows.len());
        for (index, data) in rows {
            let index = u32::try_from(index)
                .map_err(|_| StorageError::corrupt(kind, id, format!("negative chunk index {}", index)))?;
            chunks.push((index, Bytes::from(data)));
        }

        reassemble(&manifest, chunks)
    }

    async fn delete_ids(&self, kind: ArtifactKind, ids: &[String]) -> StorageResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE artifact_id = ANY($1)",
            kind.manifest_table()
        ))
        .bind(ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        sqlx::query(&format!(
            "DELETE FROM {} WHERE artifact_id = ANY($1)",
            kind.chunk_table()
        ))
        .bind(ids)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(deleted)
    }
}

#[async_trait]
impl ArtifactStore for PgArtifactStore {
    async fn put(
        &self,
        kind: ArtifactKind,
        id: &ArtifactId,
        data: Bytes,
        options: PutOptions,
    ) -> StorageResult<ArtifactManifest> {
        let start = Instant::now();
        let total_size =
            i64::try_from(data.len()).map_err(|_| StorageError::TooLarge(data.len() as u64))?;
        let chunk_count = expected_chunk_count(data.len() as u64, self.chunking.chunk_size());
        let sha256 = digest_hex(&data);
        let chunks = split_chunks(&data, self.chunking);

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE artifact_id = $1",
            kind.chunk_table()
        ))
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        let insert_chunk = format!(
            "INSERT INTO {} (artifact_id, chunk_index, data) VALUES ($1, $2, $3)",
            kind.chunk_table()
        );
        for (index, chunk) in chunks.iter().enumerate() {
            sqlx::query(&insert_chunk)
                .bind(id.as_str())
                .bind(index as i32)
                .bind(chunk.as_ref())
                .execute(&mut *tx)
                .await?;
        }

        let now = Utc::now();
        let row = sqlx::query_as::<_, ManifestRow>(&format!(
            "INSERT INTO {table} ({cols})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (artifact_id) DO UPDATE SET
                total_size = EXCLUDED.total_size,
                chunk_count = EXCLUDED.chunk_count,
                chunk_size = EXCLUDED.chunk_size,
                sha256 = EXCLUDED.sha256,
                media_type = EXCLUDED.media_type,
                session_id = EXCLUDED.session_id,
                source_ref = EXCLUDED.source_ref,
                duration_secs = EXCLUDED.duration_secs,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
             RETURNING {cols}",
            table = kind.manifest_table(),
            cols = MANIFEST_COLUMNS
        ))
        .bind(id.as_str())
        .bind(total_size)
        .bind(chunk_count as i32)
        .bind(self.chunking.chunk_size() as i32)
        .bind(&sha256)
        .bind(options.media_type.as_str())
        .bind(options.session_id.as_deref())
        .bind(options.source_ref.as_deref())
        .bind(options.duration_secs)
        .bind(now)
        .bind(options.expires_at(now))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let manifest = row.into_manifest(kind)?;
        metrics::record_write(kind, manifest.total_size, manifest.chunk_count);
        metrics::record_operation("put", kind, true, start.elapsed().as_secs_f64());
        info!(
            artifact_id = %id,
            kind = %kind,
            chunks = manifest.chunk_count,
            size_mb = format!("{:.2}", manifest.size_mb()),
            "Stored artifact"
        );
        Ok(manifest)
    }

    async fn get(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<Bytes> {
        let start = Instant::now();
        let result = self.read(kind, id).await;
        match &result {
            Ok(bytes) => debug!(artifact_id = %id, kind = %kind, bytes = bytes.len(), "Read artifact"),
            Err(e @ StorageError::Corrupt { .. }) => {
                metrics::record_corrupt_read(kind);
                warn!(artifact_id = %id, kind = %kind, "Corrupt artifact: {}", e);
            }
            Err(_) => {}
        }
        metrics::record_operation("get", kind, result.is_ok(), start.elapsed().as_secs_f64());
        result
    }

    async fn manifest(
        &self,
        kind: ArtifactKind,
        id: &ArtifactId,
    ) -> StorageResult<ArtifactManifest> {
        sqlx::query_as::<_, ManifestRow>(&format!(
            "SELECT {} FROM {} WHERE artifact_id = $1",
            MANIFEST_COLUMNS,
            kind.manifest_table()
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::not_found(kind, id))?
        .into_manifest(kind)
    }

    async fn delete(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<bool> {
        let deleted = self.delete_ids(kind, &[id.as_str().to_string()]).await?;
        Ok(deleted > 0)
    }

    async fn delete_session(&self, kind: ArtifactKind, session_id: &str) -> StorageResult<u64> {
        let ids: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT artifact_id FROM {} WHERE session_id = $1",
            kind.manifest_table()
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        let deleted = self.delete_ids(kind, &ids).await?;
        debug!(kind = %kind, session_id, deleted, "Deleted session artifacts");
        Ok(deleted)
    }

    async fn delete_expired(
        &self,
        kind: ArtifactKind,
        older_than: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        let ids: Vec<String> = sqlx::query_scalar(&format!(
            "DELETE FROM {} WHERE created_at < $1 OR (expires_at IS NOT NULL AND expires_at <= now())
             RETURNING artifact_id",
            kind.manifest_table()
        ))
        .bind(older_than)
        .fetch_all(&mut *tx)
        .await?;

        if !ids.is_empty() {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE artifact_id = ANY($1)",
                kind.chunk_table()
            ))
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        let deleted = ids.len() as u64;
        metrics::record_expired(kind, deleted);
        metrics::record_operation("delete_expired", kind, true, start.elapsed().as_secs_f64());
        if deleted > 0 {
            info!(kind = %kind, deleted, "Deleted expired artifacts");
        }
        Ok(deleted)
    }

    async fn find_by_source_ref(
        &self,
        kind: ArtifactKind,
        source_ref: &str,
    ) -> StorageResult<Option<ArtifactManifest>> {
        sqlx::query_as::<_, ManifestRow>(&format!(
            "SELECT {} FROM {} WHERE source_ref = $1 ORDER BY created_at DESC LIMIT 1",
            MANIFEST_COLUMNS,
            kind.manifest_table()
        ))
        .bind(source_ref)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| row.into_manifest(kind))
        .transpose()
    }

    async fn stats(&self, kind: ArtifactKind) -> StorageResult<StoreStats> {
        let (count, bytes, chunks): (i64, Option<i64>, Option<i64>) = sqlx::query_as(&format!(
            "SELECT COUNT(*), SUM(total_size)::BIGINT, SUM(chunk_count)::BIGINT FROM {}",
            kind.manifest_table()
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreStats {
            artifact_count: count.max(0) as u64,
            total_bytes: bytes.unwrap_or(0).max(0) as u64,
            chunk_count: chunks.unwrap_or(0).max(0) as u64,
        })
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        for kind in ArtifactKind::ALL {
            for statement in schema_statements(kind) {
                sqlx::query(&statement).execute(&self.pool).await?;
            }
        }
        debug!("Artifact schema ensured");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// DDL for one table family.
fn schema_statements(kind: ArtifactKind) -> Vec<String> {
    let manifest = kind.manifest_table();
    let chunks = kind.chunk_table();
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {manifest} (
                artifact_id TEXT PRIMARY KEY,
                total_size BIGINT NOT NULL,
                chunk_count INT NOT NULL,
                chunk_size INT NOT NULL,
                sha256 TEXT NOT NULL,
                media_type TEXT NOT NULL DEFAULT 'video',
                session_id TEXT,
                source_ref TEXT,
                duration_secs DOUBLE PRECISION,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                expires_at TIMESTAMPTZ
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {chunks} (
                artifact_id TEXT NOT NULL,
                chunk_index INT NOT NULL,
                data BYTEA NOT NULL,
                PRIMARY KEY (artifact_id, chunk_index)
            )"
        ),
        format!("CREATE INDEX IF NOT EXISTS {manifest}_created_at_idx ON {manifest} (created_at)"),
        format!("CREATE INDEX IF NOT EXISTS {manifest}_session_idx ON {manifest} (session_id)"),
        format!("CREATE INDEX IF NOT EXISTS {manifest}_source_ref_idx ON {manifest} (source_ref)"),
    ]
}
