// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic doc-sync usage example.
//!
//! Demonstrates:
//! 1. Configuring a store with compression and encryption
//! 2. Writing a document, then writing it again (differential skip)
//! 3. Reading back (cache hit, then remote after clearing the cache)
//! 4. Browsing version history and restoring an older version
//! 5. Displaying store counters and raw `metrics` output
//!
//! # Run
//!
//! Against an in-process remote:
//! ```bash
//! cargo run --example basic_usage
//! ```
//!
//! Against a real endpoint:
//! ```bash
//! DOC_SYNC_URL=http://localhost:8080/api/doc/1 cargo run --example basic_usage
//! ```

use std::sync::Arc;

use doc_sync::{DocStore, DocStoreConfig, InMemoryRemote, RemoteStore};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures everything the store emits)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_sync=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║              doc-sync: Basic Usage Example                    ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    let workdir = tempfile::tempdir()?;
    let url = std::env::var("DOC_SYNC_URL").ok();

    let config = DocStoreConfig {
        remote_url: url.clone(),
        encryption_enabled: true,
        encryption_key: Some("correct horse battery staple".into()),
        compression_min_bytes: 256,
        fallback_path: workdir.path().join("fallback.json"),
        max_versions: 5,
        ..Default::default()
    };

    match url {
        Some(url) => {
            println!("📦 Using HTTP remote at {url}");
            run(DocStore::<Value>::http(config)?).await?;
        }
        None => {
            println!("📦 Using in-process remote (set DOC_SYNC_URL for HTTP)");
            let remote = Arc::new(InMemoryRemote::new());
            run(DocStore::<Value, _>::new(config, remote.clone())?).await?;
            println!(
                "\n🌐 Remote saw {} fetches and {} stores",
                remote.fetch_count(),
                remote.store_count()
            );
            if let Some(body) = remote.body() {
                println!("   └─ Stored body: {} bytes of envelope JSON", body.len());
            }
        }
    }

    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

async fn run<R: RemoteStore>(store: DocStore<Value, R>) -> Result<(), Box<dyn std::error::Error>> {
    // ─────────────────────────────────────────────────────────────────────────
    // 1. Write a few versions of a save game
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Writing three versions...");
    for level in 1..=3 {
        let doc = save_game(level);
        let start = std::time::Instant::now();
        let outcome = store.write(&doc).await?;
        println!("   └─ level {level}: {outcome} ({:?})", start.elapsed());
    }

    println!("\n♻️  Writing level 3 again...");
    let outcome = store.write(&save_game(3)).await?;
    println!("   └─ {outcome:?} (unchanged, no request sent)");

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Read back
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Reading...");
    let read = store.read_detailed().await;
    println!("   └─ from {}: level {}", read.source, level_of(read.value.as_ref()));

    store.clear_cache().await;
    let read = store.read_detailed().await;
    println!("   └─ after clear_cache, from {}: level {}", read.source, level_of(read.value.as_ref()));

    // ─────────────────────────────────────────────────────────────────────────
    // 3. History and restore
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🕰️  Version history:");
    for entry in store.versions().await {
        println!(
            "   └─ #{} level {} checksum {}…",
            entry.sequence,
            level_of(Some(&entry.snapshot)),
            &entry.checksum[..12]
        );
    }

    println!("\n⏪ Restoring oldest version...");
    let outcome = store.restore_version(0).await?;
    println!("   └─ {outcome}");
    println!("   └─ now at level {}", level_of(store.read().await.as_ref()));

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Counters
    // ─────────────────────────────────────────────────────────────────────────
    let m = store.metrics();
    println!("\n📊 Store Metrics:");
    println!("   ┌─ Reads: {} (cache {}, remote {}, fallback {})", m.reads, m.cache_hits, m.remote_reads, m.fallback_reads);
    println!("   ├─ Writes: {} (skipped {}, failed {})", m.writes, m.skipped_writes, m.failed_writes);
    println!("   ├─ Bytes: {} → {} (ratio {:.2})", m.bytes_original, m.bytes_stored, m.compression_ratio());
    println!("   ├─ Avg read: {:.2} ms, avg write: {:.2} ms", m.average_read_ms(), m.average_write_ms());
    println!("   └─ Pending resync: {}", store.has_pending_resync());

    Ok(())
}

fn save_game(level: u64) -> Value {
    let inventory: Vec<Value> = (0..level * 20)
        .map(|i| json!({"slot": i, "item": "healing potion", "quantity": 3}))
        .collect();
    json!({
        "player": "Ines",
        "level": level,
        "inventory": inventory,
        "flags": {"tutorial_done": true, "boss_defeated": level > 2},
    })
}

fn level_of(doc: Option<&Value>) -> String {
    doc.and_then(|d| d.get("level"))
        .map(Value::to_string)
        .unwrap_or_else(|| "-".into())
}

/// Dump all captured metrics, grouped by kind
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let max = samples.iter().map(|v| v.into_inner()).fold(0.0, f64::max);
                histograms.push((name, label_str, count, sum, max));
            }
        }
    }

    counters.sort();
    gauges.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    histograms.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

    if !counters.is_empty() {
        println!("   ┌─ Counters");
        for (name, labels, value) in &counters {
            println!("   │  └─ {name}{labels} = {value}");
        }
    }
    if !gauges.is_empty() {
        println!("   ├─ Gauges");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {name}{labels} = {value:.0}");
        }
    }
    if !histograms.is_empty() {
        println!("   └─ Histograms");
        for (name, labels, count, sum, max) in &histograms {
            let avg = if *count > 0 { sum / *count as f64 } else { 0.0 };
            println!("      └─ {name}{labels} count={count} avg={avg:.4} max={max:.4}");
        }
    }
    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
