//! In-process artifact store.
//!
//! Keeps manifests and chunks in separate maps, like the two tables of the
//! database backend, and swaps them under a single write lock so readers get
//! the same all-or-nothing view.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use reel_models::{ArtifactId, ArtifactKind, ArtifactManifest};

use crate::chunking::{digest_hex, expected_chunk_count, reassemble, split_chunks, ChunkingConfig};
use crate::error::{StorageError, StorageResult};
use crate::metrics;
use crate::store::{ArtifactStore, PutOptions, StoreStats};

type Key = (ArtifactKind, ArtifactId);

#[derive(Default)]
struct Tables {
    manifests: HashMap<Key, ArtifactManifest>,
    chunks: HashMap<Key, BTreeMap<u32, Bytes>>,
}

impl Tables {
    fn remove(&mut self, key: &Key) -> bool {
        let existed = self.manifests.remove(key).is_some();
        self.chunks.remove(key);
        existed
    }

    fn remove_where(&mut self, kind: ArtifactKind, pred: impl Fn(&ArtifactManifest) -> bool) -> u64 {
        let doomed: Vec<Key> = self
            .manifests
            .iter()
            .filter(|((k, _), m)| *k == kind && pred(m))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len() as u64
    }
}

/// Artifact store held in memory.
pub struct MemoryArtifactStore {
    chunking: ChunkingConfig,
    tables: RwLock<Tables>,
}

impl MemoryArtifactStore {
    pub fn new(chunking: ChunkingConfig) -> Self {
        Self {
            chunking,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Replace a stored chunk payload without touching the manifest.
    #[cfg(test)]
    pub(crate) async fn tamper_chunk(&self, kind: ArtifactKind, id: &ArtifactId, index: u32, data: Bytes) {
        let mut tables = self.tables.write().await;
        if let Some(chunks) = tables.chunks.get_mut(&(kind, id.clone())) {
            chunks.insert(index, data);
        }
    }

    /// Drop a stored chunk without touching the manifest.
    #[cfg(test)]
    pub(crate) async fn drop_chunk(&self, kind: ArtifactKind, id: &ArtifactId, index: u32) {
        let mut tables = self.tables.write().await;
        if let Some(chunks) = tables.chunks.get_mut(&(kind, id.clone())) {
            chunks.remove(&index);
        }
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(
        &self,
        kind: ArtifactKind,
        id: &ArtifactId,
        data: Bytes,
        options: PutOptions,
    ) -> StorageResult<ArtifactManifest> {
        let start = Instant::now();
        let now = Utc::now();
        let chunks = split_chunks(&data, self.chunking);

        let manifest = ArtifactManifest {
            id: id.clone(),
            kind,
            total_size: data.len() as u64,
            chunk_count: expected_chunk_count(data.len() as u64, self.chunking.chunk_size()),
            chunk_size: self.chunking.chunk_size(),
            sha256: digest_hex(&data),
            media_type: options.media_type,
            session_id: options.session_id.clone(),
            source_ref: options.source_ref.clone(),
            duration_secs: options.duration_secs,
            created_at: now,
            expires_at: options.expires_at(now),
        };

        {
            let mut tables = self.tables.write().await;
            let key = (kind, id.clone());
            tables.chunks.insert(
                key.clone(),
                chunks.into_iter().enumerate().map(|(i, c)| (i as u32, c)).collect(),
            );
            tables.manifests.insert(key, manifest.clone());
        }

        metrics::record_write(kind, manifest.total_size, manifest.chunk_count);
        metrics::record_operation("put", kind, true, start.elapsed().as_secs_f64());
        debug!(
            artifact_id = %id,
            kind = %kind,
            chunks = manifest.chunk_count,
            size_mb = format!("{:.2}", manifest.size_mb()),
            "Stored artifact in memory"
        );
        Ok(manifest)
    }

    async fn get(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<Bytes> {
        let start = Instant::now();
        let (manifest, chunks) = {
            let tables = self.tables.read().await;
            let key = (kind, id.clone());
            let manifest = tables
                .manifests
                .get(&key)
                .cloned()
                .ok_or_else(|| StorageError::not_found(kind, id))?;
            let chunks: Vec<(u32, Bytes)> = tables
                .chunks
                .get(&key)
                .map(|c| c.iter().map(|(i, b)| (*i, b.clone())).collect())
                .unwrap_or_default();
            (manifest, chunks)
        };

        let result = reassemble(&manifest, chunks);
        if matches!(result, Err(StorageError::Corrupt { .. })) {
            metrics::record_corrupt_read(kind);
        }
        metrics::record_operation("get", kind, result.is_ok(), start.elapsed().as_secs_f64());
        result
    }

    async fn manifest(
        &self,
        kind: ArtifactKind,
        id: &ArtifactId,
    ) -> StorageResult<ArtifactManifest> {
        self.tables
            .read()
            .await
            .manifests
            .get(&(kind, id.clone()))
            .cloned()
            .ok_or_else(|| StorageError::not_found(kind, id))
    }

    async fn delete(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<bool> {
        Ok(self.tables.write().await.remove(&(kind, id.clone())))
    }

    async fn delete_session(&self, kind: ArtifactKind, session_id: &str) -> StorageResult<u64> {
        let deleted = self
            .tables
            .write()
            .await
            .remove_where(kind, |m| m.session_id.as_deref() == Some(session_id));
        debug!(kind = %kind, session_id, deleted, "Deleted session artifacts");
        Ok(deleted)
    }

    async fn delete_expired(
        &self,
        kind: ArtifactKind,
        older_than: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let now = Utc::now();
        let deleted = self
            .tables
            .write()
            .await
            .remove_where(kind, |m| m.created_at < older_than || m.is_expired(now));
        metrics::record_expired(kind, deleted);
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
        Ok(self
            .tables
            .read()
            .await
            .manifests
            .iter()
            .filter(|((k, _), m)| *k == kind && m.source_ref.as_deref() == Some(source_ref))
            .map(|(_, m)| m)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn stats(&self, kind: ArtifactKind) -> StorageResult<StoreStats> {
        let tables = self.tables.read().await;
        Ok(tables
            .manifests
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .fold(StoreStats::default(), |mut acc, (_, m)| {
                acc.artifact_count += 1;
                acc.total_bytes += m.total_size;
                acc.chunk_count += m.chunk_count as u64;
                acc
            }))
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
