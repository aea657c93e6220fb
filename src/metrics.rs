// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for doc-sync.
//!
//! Two layers:
//! - Facade emission through the `metrics` crate. The host application picks
//!   the exporter (Prometheus, OTEL, etc.); with no recorder installed these
//!   calls are no-ops.
//! - [`StoreMetrics`], in-process atomic counters behind
//!   [`crate::DocStore::metrics`], for callers that want numbers without an
//!   exporter.
//!
//! Neither layer influences control flow.
//!
//! # Metric Naming Convention
//! - `doc_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for size histograms
//!
//! # Labels
//! - `operation`: read, write, resync, restore
//! - `source`: cache, remote, fallback, empty
//! - `status`: written, skipped, failed

use metrics::{counter, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Record where a read was answered from
pub fn record_read(source: &str) {
    counter!(
        "doc_sync_reads_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record a write outcome and, for written documents, its sizes
pub fn record_write(status: &str, original_bytes: usize, stored_bytes: usize) {
    counter!(
        "doc_sync_writes_total",
        "status" => status.to_string()
    )
    .increment(1);

    if status == "written" {
        histogram!("doc_sync_document_original_bytes").record(original_bytes as f64);
        histogram!("doc_sync_document_stored_bytes").record(stored_bytes as f64);
        counter!("doc_sync_bytes_written_total").increment(stored_bytes as u64);
    }
}

/// Record operation latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "doc_sync_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record an error with category for alerting
pub fn record_error(component: &str, operation: &str, error_type: &str) {
    counter!(
        "doc_sync_errors_total",
        "component" => component.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record an integrity failure (checksum, authentication, malformed envelope)
pub fn record_integrity_failure(stage: &str) {
    counter!(
        "doc_sync_integrity_failures_total",
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// Record a retry of a remote operation
pub fn record_retry(operation: &str) {
    counter!(
        "doc_sync_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a caller suspended by the rate limiter
pub fn record_rate_limited() {
    counter!("doc_sync_rate_limited_total").increment(1);
}

/// Record use of the local fallback
pub fn record_fallback(operation: &str, success: bool) {
    let status = if success { "success" } else { "miss" };
    counter!(
        "doc_sync_fallback_total",
        "operation" => operation.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn record_fallback_save_failure() {
    counter!("doc_sync_fallback_save_failures_total").increment(1);
}

/// Set whether the fallback holds a write the remote never acknowledged
pub fn set_pending_resync(pending: bool) {
    gauge!("doc_sync_pending_resync").set(if pending { 1.0 } else { 0.0 });
}

/// Set current version history depth
pub fn set_history_depth(count: usize) {
    gauge!("doc_sync_history_entries").set(count as f64);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-PROCESS STATS - Atomic counters, readable without an exporter
// ═══════════════════════════════════════════════════════════════════════════

/// Counters owned by one store instance.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    reads: AtomicU64,
    cache_hits: AtomicU64,
    remote_reads: AtomicU64,
    fallback_reads: AtomicU64,
    empty_reads: AtomicU64,
    writes: AtomicU64,
    skipped_writes: AtomicU64,
    failed_writes: AtomicU64,
    errors: AtomicU64,
    integrity_failures: AtomicU64,
    retries: AtomicU64,
    bytes_original: AtomicU64,
    bytes_stored: AtomicU64,
    read_micros: AtomicU64,
    write_micros: AtomicU64,
}

impl StoreMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read_from_cache(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read_from_remote(&self, elapsed: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.remote_reads.fetch_add(1, Ordering::Relaxed);
        self.add_read_time(elapsed);
    }

    pub(crate) fn read_from_fallback(&self, elapsed: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.fallback_reads.fetch_add(1, Ordering::Relaxed);
        self.add_read_time(elapsed);
    }

    pub(crate) fn read_empty(&self, elapsed: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.empty_reads.fetch_add(1, Ordering::Relaxed);
        self.add_read_time(elapsed);
    }

    pub(crate) fn write_succeeded(&self, original: usize, stored: usize, elapsed: Duration) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_original.fetch_add(original as u64, Ordering::Relaxed);
        self.bytes_stored.fetch_add(stored as u64, Ordering::Relaxed);
        self.write_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn write_skipped(&self) {
        self.skipped_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write_failed(&self) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn error(&self, integrity: bool) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if integrity {
            self.integrity_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn add_read_time(&self, elapsed: Duration) {
        self.read_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            remote_reads: self.remote_reads.load(Ordering::Relaxed),
            fallback_reads: self.fallback_reads.load(Ordering::Relaxed),
            empty_reads: self.empty_reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            skipped_writes: self.skipped_writes.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            bytes_original: self.bytes_original.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
            read_micros: self.read_micros.load(Ordering::Relaxed),
            write_micros: self.write_micros.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`StoreMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// All reads, however answered
    pub reads: u64,
    pub cache_hits: u64,
    pub remote_reads: u64,
    pub fallback_reads: u64,
    /// Reads that found nothing anywhere
    pub empty_reads: u64,
    /// Writes acknowledged by the remote
    pub writes: u64,
    pub skipped_writes: u64,
    pub failed_writes: u64,
    pub errors: u64,
    pub integrity_failures: u64,
    pub retries: u64,
    /// Serialized size of written documents
    pub bytes_original: u64,
    /// Payload size after compression and encryption
    pub bytes_stored: u64,
    read_micros: u64,
    write_micros: u64,
}

impl MetricsSnapshot {
    /// Stored / original bytes across all writes; 1.0 before any write.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_original == 0 {
            1.0
        } else {
            self.bytes_stored as f64 / self.bytes_original as f64
        }
    }

    /// Mean latency of reads that went past the cache.
    #[must_use]
    pub fn average_read_ms(&self) -> f64 {
        let timed = self.reads - self.cache_hits;
        if timed == 0 {
            0.0
        } else {
            self.read_micros as f64 / timed as f64 / 1000.0
        }
    }

    #[must_use]
    pub fn average_write_ms(&self) -> f64 {
        if self.writes == 0 {
            0.0
        } else {
            self.write_micros as f64 / self.writes as f64 / 1000.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    fn counter_value(counters: &[(String, u64)], name: &str) -> u64 {
        counters
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .sum()
    }

    fn counters(snapshotter: &metrics_util::debugging::Snapshotter) -> Vec<(String, u64)> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(v) => Some((key.key().name().to_string(), v)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_facade_counters_are_emitted() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_read("cache");
            record_read("remote");
            record_write("written", 2048, 512);
            record_write("skipped", 0, 0);
            record_retry("remote_write");
            record_rate_limited();
        });

        let c = counters(&snapshotter);
        assert_eq!(counter_value(&c, "doc_sync_reads_total"), 2);
        assert_eq!(counter_value(&c, "doc_sync_writes_total"), 2);
        assert_eq!(counter_value(&c, "doc_sync_bytes_written_total"), 512);
        assert_eq!(counter_value(&c, "doc_sync_retries_total"), 1);
        assert_eq!(counter_value(&c, "doc_sync_rate_limited_total"), 1);
    }

    #[test]
    fn test_no_recorder_is_noop() {
        record_error("remote", "read", "timeout");
        record_integrity_failure("checksum");
        record_fallback("read", false);
        set_pending_resync(true);
        set_history_depth(3);
    }

    #[test]
    fn test_latency_timer_records_on_drop() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let _timer = LatencyTimer::new("read");
        });

        let recorded = snapshotter.snapshot().into_vec().into_iter().any(|(key, _, _, value)| {
            key.key().name() == "doc_sync_operation_seconds"
                && matches!(value, DebugValue::Histogram(ref samples) if samples.len() == 1)
        });
        assert!(recorded);
    }

    #[test]
    fn test_store_metrics_snapshot() {
        let m = StoreMetrics::new();
        m.read_from_cache();
        m.read_from_remote(Duration::from_millis(4));
        m.read_from_fallback(Duration::from_millis(2));
        m.read_empty(Duration::ZERO);
        m.write_succeeded(1000, 250, Duration::from_millis(10));
        m.write_skipped();
        m.write_failed();
        m.error(true);
        m.error(false);
        m.retried();

        let s = m.snapshot();
        assert_eq!(s.reads, 4);
        assert_eq!(s.cache_hits, 1);
        assert_eq!(s.remote_reads, 1);
        assert_eq!(s.fallback_reads, 1);
        assert_eq!(s.empty_reads, 1);
        assert_eq!(s.writes, 1);
        assert_eq!(s.skipped_writes, 1);
        assert_eq!(s.failed_writes, 1);
        assert_eq!(s.errors, 2);
        assert_eq!(s.integrity_failures, 1);
        assert_eq!(s.retries, 1);
        assert!((s.compression_ratio() - 0.25).abs() < f64::EPSILON);
        assert!((s.average_read_ms() - 2.0).abs() < 1e-9);
        assert!((s.average_write_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot_ratios() {
        let s = StoreMetrics::new().snapshot();
        assert_eq!(s.compression_ratio(), 1.0);
        assert_eq!(s.average_read_ms(), 0.0);
        assert_eq!(s.average_write_ms(), 0.0);
    }
}
