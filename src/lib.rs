// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Doc Sync
//!
//! A resilience layer that turns one remote HTTP document endpoint into a
//! dependable store for a single application state blob.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       DocStore API                          │
//! │  • read() / write() / restore_version() / resync()         │
//! │  • One async mutex per store serializes operations         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Cache + Version History                     │
//! │  • Content hash skips unchanged writes                     │
//! │  • TTL-bounded last known value answers reads              │
//! │  • Bounded FIFO of every write attempt                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Transform Pipeline                        │
//! │  • SHA-256 checksum of the serialized document             │
//! │  • Size-gated gzip / brotli compression                    │
//! │  • Optional AES-256-GCM with scrypt-derived key            │
//! │  • JSON envelope { data, metadata }                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               (rate limiter + retry with backoff)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Remote store        │      Local fallback      │
//! │  • HTTP GET / PUT|POST           │  • Last good document    │
//! │  • 404 / empty = no document     │  • Pending-resync marker │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc_sync::{DocStore, DocStoreConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DocStoreConfig {
//!         remote_url: Some("https://blobs.example.com/api/doc/42".into()),
//!         encryption_enabled: true,
//!         encryption_key: Some("correct horse battery staple".into()),
//!         ..Default::default()
//!     };
//!     let store = DocStore::<serde_json::Value>::http(config).expect("valid config");
//!
//!     store.write(&json!({"level": 3, "inventory": ["sword"]})).await.ok();
//!
//!     if let Some(doc) = store.read().await {
//!         println!("Loaded: {doc}");
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`DocStore`] orchestrating all components
//! - [`pipeline`]: Checksum, compression and encryption stages
//! - [`envelope`]: Wire format and body classification
//! - [`storage`]: Remote backends (HTTP, in-memory)
//! - [`resilience`]: Rate limiting, retry, local fallback
//! - [`cache`] / [`history`]: In-memory state
//! - [`metrics`]: `metrics` facade emission and in-process counters

pub mod cache;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod resilience;
pub mod storage;

mod util;

pub use cache::{CacheEntry, DocumentCache};
pub use codec::{CodecError, DocumentCodec, JsonCodec};
pub use config::{DocStoreConfig, RemoteMethod};
pub use coordinator::{DocStore, ReadOutcome, ReadSource, WriteOutcome};
pub use envelope::{Envelope, EnvelopeMetadata, RemoteBody};
pub use error::{IntegrityError, StoreError};
pub use history::{VersionEntry, VersionHistory};
pub use metrics::{LatencyTimer, MetricsSnapshot, StoreMetrics};
pub use pipeline::compression::{CompressionAlgorithm, CompressionKind, CompressionPolicy};
pub use resilience::fallback::{FallbackStats, LocalFallback};
pub use resilience::rate_limiter::{RateLimitConfig, SlidingWindowLimiter};
pub use resilience::retry::RetryConfig;
pub use storage::http::HttpRemote;
pub use storage::memory::InMemoryRemote;
pub use storage::traits::RemoteStore;
