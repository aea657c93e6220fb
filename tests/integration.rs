//! Integration Tests for Doc Sync
//!
//! End-to-end behaviour of [`DocStore`] over the in-process remote. No
//! network or external services are needed.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//!
//! # Run only differential-sync tests
//! cargo test --test integration differential
//! ```
//!
//! # Test Organization
//! - `happy_*` - Round trips through every pipeline mode
//! - `differential_*` - Skipping unchanged writes
//! - `history_*` - Version bound, restore
//! - `cache_*` - Freshness and TTL
//! - `concurrency_*` - Shared store under parallel callers

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tempfile::{tempdir, TempDir};

use doc_sync::{
    CompressionKind, DocStore, DocStoreConfig, Envelope, InMemoryRemote, JsonCodec, ReadSource,
    StoreError, WriteOutcome,
};

type TestStore<T> = DocStore<T, Arc<InMemoryRemote>>;

// =============================================================================
// Helpers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Save {
    player: String,
    level: u32,
    inventory: Vec<String>,
    flags: BTreeMap<String, bool>,
}

fn save(level: u32) -> Save {
    Save {
        player: "Mirelle of the Northern Reach".into(),
        level,
        inventory: vec!["rope".into(), "lantern".into()],
        flags: BTreeMap::from([("tutorial_done".into(), true)]),
    }
}

/// Large enough to cross the default 1 KiB compression threshold.
fn big_save(level: u32) -> Save {
    let mut doc = save(level);
    doc.inventory = (0..120).map(|i| format!("potion_of_minor_healing_{i}")).collect();
    doc
}

/// Fast retries, no effective rate limit, cheap key derivation.
fn test_config(dir: &TempDir) -> DocStoreConfig {
    DocStoreConfig {
        fallback_path: dir.path().join("fallback.json"),
        retry_max_retries: 2,
        retry_initial_delay_ms: 1,
        retry_max_delay_ms: 5,
        rate_limit_max_requests: 10_000,
        rate_limit_window_ms: 1000,
        kdf_log_n: 4,
        ..Default::default()
    }
}

fn remote_envelope(remote: &InMemoryRemote) -> Envelope {
    serde_json::from_slice(&remote.body().expect("remote has a body")).expect("body is an envelope")
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn happy_round_trip_across_pipeline_modes() {
    for (compression, encryption) in [(false, false), (true, false), (false, true), (true, true)] {
        let dir = tempdir().unwrap();
        let remote = Arc::new(InMemoryRemote::new());
        let config = DocStoreConfig {
            compression_enabled: compression,
            encryption_enabled: encryption,
            encryption_key: encryption.then(|| "hunter2".to_string()),
            ..test_config(&dir)
        };
        let writer: TestStore<Save> = DocStore::new(config.clone(), remote.clone()).unwrap();
        let doc = big_save(7);

        match writer.write(&doc).await.unwrap() {
            WriteOutcome::Written { compressed, encrypted, .. } => {
                assert_eq!(compressed, compression, "mode ({compression}, {encryption})");
                assert_eq!(encrypted, encryption, "mode ({compression}, {encryption})");
            }
            other => panic!("expected a write, got {other:?}"),
        }

        let body = String::from_utf8(remote.body().unwrap()).unwrap();
        assert_eq!(
            body.contains("Mirelle"),
            !compression && !encryption,
            "plaintext visibility in mode ({compression}, {encryption})"
        );

        // A second instance has its own salt and an empty cache.
        let reader: TestStore<Save> = DocStore::new(
            DocStoreConfig {
                fallback_path: dir.path().join("reader.json"),
                ..config
            },
            remote.clone(),
        )
        .unwrap();
        let read = reader.read_detailed().await;
        assert_eq!(read.source, ReadSource::Remote);
        assert!(read.remote_error.is_none());
        assert_eq!(read.value.unwrap(), doc);
    }
}

#[tokio::test]
async fn happy_brotli_round_trip() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let config = DocStoreConfig {
        compression_algorithm: "brotli".into(),
        ..test_config(&dir)
    };
    let store: TestStore<Save> = DocStore::new(config, remote.clone()).unwrap();
    let doc = big_save(3);

    store.write(&doc).await.unwrap();
    let envelope = remote_envelope(&remote);
    assert!(envelope.metadata.compressed);
    assert_eq!(envelope.metadata.compression_type, CompressionKind::Brotli);

    store.clear_cache().await;
    assert_eq!(store.read().await.unwrap(), doc);
}

#[tokio::test]
async fn happy_envelope_metadata_describes_payload() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let config = DocStoreConfig {
        encryption_enabled: true,
        encryption_key: Some("k".into()),
        ..test_config(&dir)
    };
    let store: TestStore<Save> = DocStore::new(config, remote.clone()).unwrap();
    store.write(&big_save(1)).await.unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&remote.body().unwrap()).unwrap();
    let meta = &raw["metadata"];
    assert!(raw["data"].is_string());
    assert_eq!(meta["compressed"], true);
    assert_eq!(meta["compressionType"], "gzip");
    assert_eq!(meta["encrypted"], true);
    assert!(meta["iv"].is_string());
    assert!(meta["authTag"].is_string());
    assert!(meta["salt"].is_string());
    assert_eq!(meta["versionIndex"], 0);
    assert_eq!(meta["checksum"].as_str().unwrap().len(), 64);
    assert!(meta["originalSize"].as_u64().unwrap() > 1024);
}

#[tokio::test]
async fn happy_compression_threshold_boundary() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let config = DocStoreConfig {
        compression_min_bytes: 64,
        ..test_config(&dir)
    };
    let store: TestStore<String> =
        DocStore::with_codec(config, remote.clone(), Arc::new(JsonCodec::<String>::compact())).unwrap();

    // Compact JSON adds two quote bytes.
    let below = "a".repeat(61);
    assert!(matches!(
        store.write(&below).await.unwrap(),
        WriteOutcome::Written { compressed: false, .. }
    ));
    let meta = remote_envelope(&remote).metadata;
    assert_eq!(meta.original_size, 63);
    assert_eq!(meta.compression_type, CompressionKind::None);

    let at = "a".repeat(62);
    assert!(matches!(
        store.write(&at).await.unwrap(),
        WriteOutcome::Written { compressed: true, .. }
    ));
    let meta = remote_envelope(&remote).metadata;
    assert_eq!(meta.original_size, 64);
    assert_eq!(meta.compression_type, CompressionKind::Gzip);
}

#[tokio::test]
async fn happy_bare_legacy_document_is_read() {
    let dir = tempdir().unwrap();
    let doc = save(4);
    let remote = Arc::new(InMemoryRemote::with_body(serde_json::to_vec(&doc).unwrap()));
    let store: TestStore<Save> = DocStore::new(test_config(&dir), remote).unwrap();

    let read = store.read_detailed().await;
    assert_eq!(read.source, ReadSource::Remote);
    assert_eq!(read.value.unwrap(), doc);
}

#[tokio::test]
async fn happy_empty_remote_and_no_fallback_is_absent() {
    let dir = tempdir().unwrap();
    let store: TestStore<Save> =
        DocStore::new(test_config(&dir), Arc::new(InMemoryRemote::new())).unwrap();

    let read = store.read_detailed().await;
    assert!(read.value.is_none());
    assert_eq!(read.source, ReadSource::Empty);
    assert!(read.remote_error.is_none());
    assert_eq!(store.metrics().empty_reads, 1);
}

#[tokio::test]
async fn happy_successful_operations_refresh_fallback_file() {
    let dir = tempdir().unwrap();
    let config = test_config(&dir);
    let path = config.fallback_path.clone();
    let remote = Arc::new(InMemoryRemote::with_body(serde_json::to_vec(&save(2)).unwrap()));
    let store: TestStore<Save> = DocStore::new(config, remote).unwrap();

    store.read().await.unwrap();
    let on_disk: Save = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk, save(2));

    store.write(&save(9)).await.unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains('\n'), "fallback is pretty JSON");
    assert_eq!(serde_json::from_str::<Save>(&text).unwrap(), save(9));
    assert!(!store.has_pending_resync());
}

#[tokio::test]
async fn happy_invalid_config_is_rejected_at_construction() {
    let dir = tempdir().unwrap();
    let config = DocStoreConfig {
        encryption_enabled: true,
        encryption_key: None,
        ..test_config(&dir)
    };
    let result: Result<TestStore<Save>, _> = DocStore::new(config, Arc::new(InMemoryRemote::new()));
    assert!(matches!(result, Err(StoreError::Configuration(_))));
}

// =============================================================================
// Differential sync
// =============================================================================

#[tokio::test]
async fn differential_identical_write_is_skipped_without_requests() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let store: TestStore<Save> = DocStore::new(test_config(&dir), remote.clone()).unwrap();

    assert!(!store.write(&save(5)).await.unwrap().is_skipped());
    let requests = remote.request_count();

    assert_eq!(store.write(&save(5)).await.unwrap(), WriteOutcome::Skipped);
    assert_eq!(remote.request_count(), requests);
    assert_eq!(store.metrics().skipped_writes, 1);
    assert_eq!(store.versions().await.len(), 1, "skipped writes are not versioned");
}

#[tokio::test]
async fn differential_map_order_does_not_matter() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let store: TestStore<HashMap<String, u32>> = DocStore::new(test_config(&dir), remote.clone()).unwrap();

    let forward: HashMap<String, u32> = (0..32).map(|i| (format!("key{i}"), i)).collect();
    let backward: HashMap<String, u32> = (0..32).rev().map(|i| (format!("key{i}"), i)).collect();

    store.write(&forward).await.unwrap();
    assert!(store.write(&backward).await.unwrap().is_skipped());
    assert_eq!(remote.store_count(), 1);
}

#[tokio::test]
async fn differential_disabled_always_writes() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let config = DocStoreConfig {
        differential_sync: false,
        ..test_config(&dir)
    };
    let store: TestStore<Save> = DocStore::new(config, remote.clone()).unwrap();

    store.write(&save(1)).await.unwrap();
    assert!(!store.write(&save(1)).await.unwrap().is_skipped());
    assert_eq!(remote.store_count(), 2);
}

#[tokio::test]
async fn differential_value_read_from_remote_is_not_rewritten() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::with_body(serde_json::to_vec(&save(6)).unwrap()));
    let store: TestStore<Save> = DocStore::new(test_config(&dir), remote.clone()).unwrap();

    store.read().await.unwrap();
    assert!(store.write(&save(6)).await.unwrap().is_skipped());
    assert_eq!(remote.store_count(), 0);
}

// =============================================================================
// Version history
// =============================================================================

#[tokio::test]
async fn history_is_bounded_with_fifo_eviction() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let config = DocStoreConfig {
        max_versions: 5,
        ..test_config(&dir)
    };
    let store: TestStore<Save> = DocStore::new(config, remote.clone()).unwrap();

    for level in 1..=12 {
        store.write(&save(level)).await.unwrap();
    }

    let versions = store.versions().await;
    assert_eq!(versions.len(), 5);
    // Oldest retained is write N - MAX + 1
    assert_eq!(store.version(0).await.unwrap().snapshot.level, 8);
    assert_eq!(store.version(-1).await.unwrap().snapshot.level, 12);
    assert!(store.version(5).await.is_none());
    assert!(store.version(-6).await.is_none());

    assert_eq!(versions[0].sequence, 7);
    assert_eq!(remote_envelope(&remote).metadata.version_index, 11);
    assert_eq!(versions[4].checksum, remote_envelope(&remote).metadata.checksum);
}

#[tokio::test]
async fn history_restore_rolls_remote_back() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let config = test_config(&dir);
    let store: TestStore<Save> = DocStore::new(config.clone(), remote.clone()).unwrap();

    store.write(&save(1)).await.unwrap();
    store.write(&save(2)).await.unwrap();

    let outcome = store.restore_version(0).await.unwrap();
    assert_eq!(outcome.version_index(), Some(2));
    assert_eq!(store.versions().await.len(), 3);

    let reader: TestStore<Save> = DocStore::new(
        DocStoreConfig {
            fallback_path: dir.path().join("reader.json"),
            ..config
        },
        remote.clone(),
    )
    .unwrap();
    assert_eq!(reader.read().await.unwrap(), save(1));

    // Restoring the value already cached still writes.
    let stores_before = remote.store_count();
    assert!(!store.restore_version(-1).await.unwrap().is_skipped());
    assert_eq!(remote.store_count(), stores_before + 1);
}

#[tokio::test]
async fn history_restore_missing_index_is_error() {
    let dir = tempdir().unwrap();
    let store: TestStore<Save> =
        DocStore::new(test_config(&dir), Arc::new(InMemoryRemote::new())).unwrap();

    assert!(matches!(
        store.restore_version(0).await,
        Err(StoreError::VersionNotFound(0))
    ));
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test]
async fn cache_fresh_value_answers_without_network() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let store: TestStore<Save> = DocStore::new(test_config(&dir), remote.clone()).unwrap();

    store.write(&save(3)).await.unwrap();
    let read = store.read_detailed().await;
    assert_eq!(read.source, ReadSource::Cache);
    assert_eq!(read.value.unwrap(), save(3));
    assert_eq!(remote.fetch_count(), 0);
}

#[tokio::test]
async fn cache_expired_value_goes_back_to_remote() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let config = DocStoreConfig {
        cache_ttl_ms: 30,
        ..test_config(&dir)
    };
    let store: TestStore<Save> = DocStore::new(config, remote.clone()).unwrap();

    store.write(&save(3)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    let read = store.read_detailed().await;
    assert_eq!(read.source, ReadSource::Remote);
    assert_eq!(remote.fetch_count(), 1);
}

#[tokio::test]
async fn cache_clear_forces_remote_read() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let store: TestStore<Save> = DocStore::new(test_config(&dir), remote.clone()).unwrap();

    store.write(&save(3)).await.unwrap();
    store.clear_cache().await;
    assert_eq!(store.read_detailed().await.source, ReadSource::Remote);
}

// =============================================================================
// Rate limiting and concurrency
// =============================================================================

#[tokio::test]
async fn rate_limit_suspends_excess_requests() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let config = DocStoreConfig {
        rate_limit_max_requests: 2,
        rate_limit_window_ms: 300,
        ..test_config(&dir)
    };
    let store: TestStore<Save> = DocStore::new(config, remote.clone()).unwrap();

    let start = Instant::now();
    for level in 1..=3 {
        store.write(&save(level)).await.unwrap();
    }
    let elapsed = start.elapsed();

    assert_eq!(remote.store_count(), 3, "nothing is rejected");
    assert!(elapsed >= Duration::from_millis(250), "third write waited only {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5));
}

#[tokio::test]
async fn concurrency_parallel_writers_are_serialized() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    let store: Arc<TestStore<Save>> = Arc::new(DocStore::new(test_config(&dir), remote.clone()).unwrap());

    let mut handles = Vec::new();
    for level in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.write(&save(level)).await }));
    }
    for handle in handles {
        assert!(!handle.await.unwrap().unwrap().is_skipped());
    }

    let versions = store.versions().await;
    let sequences: Vec<u64> = versions.iter().map(|v| v.sequence).collect();
    assert_eq!(sequences, (0..8).collect::<Vec<_>>());

    // The last write to reach the remote is the last one in history.
    let latest = versions.last().unwrap();
    assert_eq!(remote_envelope(&remote).metadata.version_index, latest.sequence);
    assert_eq!(store.read().await.unwrap(), latest.snapshot);
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn metrics_snapshot_tracks_operations() {
    let dir = tempdir().unwrap();
    let store: TestStore<Save> =
        DocStore::new(test_config(&dir), Arc::new(InMemoryRemote::new())).unwrap();

    store.write(&big_save(1)).await.unwrap();
    store.write(&big_save(1)).await.unwrap();
    store.read().await.unwrap();
    store.clear_cache().await;
    store.read().await.unwrap();

    let m = store.metrics();
    assert_eq!(m.writes, 1);
    assert_eq!(m.skipped_writes, 1);
    assert_eq!(m.failed_writes, 0);
    assert_eq!(m.reads, 2);
    assert_eq!(m.cache_hits, 1);
    assert_eq!(m.remote_reads, 1);
    assert_eq!(m.errors, 0);
    assert!(m.bytes_original > 1024);
    assert!(m.compression_ratio() < 0.5, "ratio {}", m.compression_ratio());
}
