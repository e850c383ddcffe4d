//! Splitting artifacts into bounded chunks and validating reassembly.
//!
//! Both store backends go through these functions, so the manifest/chunk
//! consistency rules live in one place:
//! - chunk `i` covers bytes `[i * chunk_size, min((i + 1) * chunk_size, len))`
//! - empty input produces zero chunks
//! - a read is trusted only if indices are exactly `0..chunk_count`, the
//!   reassembled length equals `total_size` and the SHA-256 matches

use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};

use reel_models::ArtifactManifest;

use crate::error::{StorageError, StorageResult};

/// Per-row / per-message limit of the backing database.
pub const MAX_ROW_BYTES: u64 = 16 * 1024 * 1024;

/// Largest chunk allowed; bytea escaping can double the wire size.
pub const MAX_CHUNK_SIZE: u64 = MAX_ROW_BYTES / 2;

/// Default chunk size (6 MiB).
pub const DEFAULT_CHUNK_SIZE: u32 = 6 * 1024 * 1024;

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: u32,
}

impl ChunkingConfig {
    pub fn new(chunk_size: u64) -> StorageResult<Self> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(StorageError::InvalidChunkSize {
                size: chunk_size,
                max: MAX_CHUNK_SIZE,
            });
        }
        Ok(Self {
            chunk_size: chunk_size as u32,
        })
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Number of chunks `len` bytes occupy.
pub fn expected_chunk_count(len: u64, chunk_size: u32) -> u32 {
    len.div_ceil(chunk_size as u64) as u32
}

/// Split into consecutive chunks without copying.
pub fn split_chunks(data: &Bytes, config: ChunkingConfig) -> Vec<Bytes> {
    let size = config.chunk_size as usize;
    (0..data.len())
        .step_by(size)
        .map(|start| data.slice(start..(start + size).min(data.len())))
        .collect()
}

/// Lowercase hex SHA-256 of `data`.
pub fn digest_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Reassemble chunks read for `manifest`.
///
/// `chunks` are `(sequence_index, payload)` pairs in any order.
pub fn reassemble(manifest: &ArtifactManifest, mut chunks: Vec<(u32, Bytes)>) -> StorageResult<Bytes> {
    let corrupt = |reason: String| StorageError::corrupt(manifest.kind, &manifest.id, reason);

    if chunks.len() as u64 != manifest.chunk_count as u64 {
        return Err(corrupt(format!(
            "expected {} chunks, found {}",
            manifest.chunk_count,
            chunks.len()
        )));
    }

    chunks.sort_by_key(|(index, _)| *index);
    for (expected, (index, _)) in chunks.iter().enumerate() {
        if *index as usize != expected {
            return Err(corrupt(format!("missing chunk {}", expected)));
        }
    }

    let last = chunks.len().saturating_sub(1);
    for (position, (index, payload)) in chunks.iter().enumerate() {
        let len = payload.len() as u64;
        let full = manifest.chunk_size as u64;
        if (position < last && len != full) || (position == last && (len == 0 || len > full)) {
            return Err(corrupt(format!("chunk {} has unexpected length {}", index, len)));
        }
    }

    let total: u64 = chunks.iter().map(|(_, c)| c.len() as u64).sum();
    if total != manifest.total_size {
        return Err(corrupt(format!(
            "reassembled {} bytes, manifest records {}",
            total, manifest.total_size
        )));
    }

    let mut out = BytesMut::with_capacity(total as usize);
    for (_, payload) in &chunks {
        out.extend_from_slice(payload);
    }
    let out = out.freeze();

    if digest_hex(&out) != manifest.sha256 {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reel_models::{ArtifactId, ArtifactKind, MediaType};

    const MB: u64 = 1024 * 1024;

    fn manifest_for(data: &Bytes, config: ChunkingConfig) -> ArtifactManifest {
        ArtifactManifest {
            id: ArtifactId::from("test"),
            kind: ArtifactKind::ProcessedVideo,
            total_size: data.len() as u64,
            chunk_count: expected_chunk_count(data.len() as u64, config.chunk_size()),
            chunk_size: config.chunk_size(),
            sha256: digest_hex(data),
            media_type: MediaType::Video,
            session_id: None,
            source_ref: None,
            duration_secs: None,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    fn indexed(chunks: Vec<Bytes>) -> Vec<(u32, Bytes)> {
        chunks.into_iter().enumerate().map(|(i, c)| (i as u32, c)).collect()
    }

    #[test]
    fn test_chunk_size_bounds() {
        assert!(ChunkingConfig::new(0).is_err());
        assert!(ChunkingConfig::new(MAX_CHUNK_SIZE + 1).is_err());
        assert_eq!(ChunkingConfig::new(MAX_CHUNK_SIZE).unwrap().chunk_size() as u64, MAX_CHUNK_SIZE);
        assert_eq!(ChunkingConfig::default().chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_fourteen_mb_in_six_mb_chunks() {
        let config = ChunkingConfig::new(6 * MB).unwrap();
        let data = Bytes::from(vec![7u8; (14 * MB) as usize]);
        let chunks = split_chunks(&data, config);

        let sizes: Vec<u64> = chunks.iter().map(|c| c.len() as u64).collect();
        assert_eq!(sizes, vec![6 * MB, 6 * MB, 2 * MB]);
        assert_eq!(expected_chunk_count(data.len() as u64, config.chunk_size()), 3);

        let manifest = manifest_for(&data, config);
        let out = reassemble(&manifest, indexed(chunks)).unwrap();
        assert_eq!(out.len() as u64, 14 * MB);
        assert_eq!(out, data);
    }

    #[test]
    fn test_chunk_counts_are_ceiling() {
        let config = ChunkingConfig::new(10).unwrap();
        for len in [1usize, 9, 10, 11, 20, 21, 99, 100, 101] {
            let data = Bytes::from((0..len).map(|i| i as u8).collect::<Vec<_>>());
            let chunks = split_chunks(&data, config);
            assert_eq!(chunks.len(), len.div_ceil(10), "len {}", len);
            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= 10));
            let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
            assert_eq!(joined, data.to_vec());
        }
    }

    #[test]
    fn test_empty_input_has_zero_chunks() {
        let config = ChunkingConfig::new(10).unwrap();
        let data = Bytes::new();
        assert!(split_chunks(&data, config).is_empty());

        let manifest = manifest_for(&data, config);
        assert_eq!(manifest.chunk_count, 0);
        assert_eq!(reassemble(&manifest, vec![]).unwrap(), Bytes::new());
    }

    #[test]
    fn test_missing_chunk_is_corrupt() {
        let config = ChunkingConfig::new(4).unwrap();
        let data = Bytes::from_static(b"0123456789");
        let manifest = manifest_for(&data, config);
        let mut chunks = indexed(split_chunks(&data, config));
        chunks.remove(1);

        let err = reassemble(&manifest, chunks).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_gap_with_matching_count_is_corrupt() {
        let config = ChunkingConfig::new(4).unwrap();
        let data = Bytes::from_static(b"0123456789");
        let manifest = manifest_for(&data, config);
        let mut chunks = indexed(split_chunks(&data, config));
        chunks[1].0 = 5;

        let err = reassemble(&manifest, chunks).unwrap_err();
        assert!(err.to_string().contains("missing chunk 1"));
    }

    #[test]
    fn test_out_of_order_chunks_are_sorted() {
        let config = ChunkingConfig::new(4).unwrap();
        let data = Bytes::from_static(b"0123456789");
        let manifest = manifest_for(&data, config);
        let mut chunks = indexed(split_chunks(&data, config));
        chunks.reverse();

        assert_eq!(reassemble(&manifest, chunks).unwrap(), data);
    }

    #[test]
    fn test_tampered_payload_fails_checksum() {
        let config = ChunkingConfig::new(4).unwrap();
        let data = Bytes::from_static(b"0123456789");
        let manifest = manifest_for(&data, config);
        let mut chunks = indexed(split_chunks(&data, config));
        chunks[0].1 = Bytes::from_static(b"XXXX");

        let err = reassemble(&manifest, chunks).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_mixed_generation_is_corrupt() {
        let config = ChunkingConfig::new(4).unwrap();
        let old = Bytes::from_static(b"aaaabbbbcc");
        let new = Bytes::from_static(b"ddddeeeeff");
        let manifest = manifest_for(&new, config);

        let mut chunks = indexed(split_chunks(&new, config));
        chunks[2] = (2, split_chunks(&old, config)[2].clone());

        assert!(reassemble(&manifest, chunks).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_digest_hex_known_value() {
        assert_eq!(
            digest_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
