//! Chunked artifact store.
//!
//! This crate provides:
//! - Splitting large media into bounded chunks and verified reassembly
//! - The [`ArtifactStore`] trait with atomic put / get / cleanup semantics
//! - A Postgres / CockroachDB backend (sqlx)
//! - An in-memory backend for tests and single-process runs

pub mod chunking;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod postgres;
pub mod store;

pub use chunking::{
    digest_hex, expected_chunk_count, reassemble, split_chunks, ChunkingConfig,
    DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MAX_ROW_BYTES,
};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryArtifactStore;
pub use postgres::PgArtifactStore;
pub use store::{ArtifactStore, PutOptions, StoreBackend, StoreConfig, StoreStats};
