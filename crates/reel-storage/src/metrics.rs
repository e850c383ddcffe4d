//! Metrics for artifact store operations.

use metrics::{counter, histogram};
use reel_models::ArtifactKind;

pub mod names {
    pub const STORE_OPERATIONS_TOTAL: &str = "reel_store_operations_total";
    pub const STORE_OPERATION_DURATION: &str = "reel_store_operation_duration_seconds";
    pub const STORE_BYTES_WRITTEN: &str = "reel_store_bytes_written_total";
    pub const STORE_CHUNKS_WRITTEN: &str = "reel_store_chunks_written_total";
    pub const STORE_CORRUPT_READS: &str = "reel_store_corrupt_reads_total";
    pub const STORE_EXPIRED_DELETED: &str = "reel_store_expired_deleted_total";
}

/// Record one store operation.
pub fn record_operation(operation: &'static str, kind: ArtifactKind, success: bool, secs: f64) {
    let status = if success { "success" } else { "error" };
    counter!(
        names::STORE_OPERATIONS_TOTAL,
        "operation" => operation,
        "kind" => kind.as_str(),
        "status" => status
    )
    .increment(1);
    histogram!(
        names::STORE_OPERATION_DURATION,
        "operation" => operation,
        "kind" => kind.as_str()
    )
    .record(secs);
}

pub fn record_write(kind: ArtifactKind, bytes: u64, chunks: u32) {
    counter!(names::STORE_BYTES_WRITTEN, "kind" => kind.as_str()).increment(bytes);
    counter!(names::STORE_CHUNKS_WRITTEN, "kind" => kind.as_str()).increment(chunks as u64);
}

pub fn record_corrupt_read(kind: ArtifactKind) {
    counter!(names::STORE_CORRUPT_READS, "kind" => kind.as_str()).increment(1);
}

pub fn record_expired(kind: ArtifactKind, deleted: u64) {
    counter!(names::STORE_EXPIRED_DELETED, "kind" => kind.as_str()).increment(deleted);
}
