// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Size-gated payload compression.
//!
//! Payloads below the configured threshold pass through untouched: for a
//! few hundred bytes of JSON the gzip/brotli framing costs more than it
//! saves. The algorithm is fixed per store instance and recorded in the
//! envelope so the reader knows how to undo it.
//!
//! # Example
//!
//! ```
//! use doc_sync::pipeline::compression::{compress, decompress, CompressionAlgorithm, CompressionPolicy};
//!
//! let policy = CompressionPolicy {
//!     algorithm: CompressionAlgorithm::Gzip,
//!     min_bytes: 16,
//!     level: 6,
//! };
//! let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
//! let out = compress(data, &policy).unwrap();
//! assert!(out.applied);
//! assert_eq!(decompress(&out.bytes, out.kind, out.original_size).unwrap(), data);
//! ```

use std::io::{Read, Write};
use std::str::FromStr;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_LG_WINDOW: u32 = 22;

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("compression failed: {0}")]
    CompressFailed(String),

    #[error("decompression failed: {0}")]
    DecompressFailed(String),

    #[error("unknown compression algorithm '{0}' (expected gzip or brotli)")]
    UnknownAlgorithm(String),
}

/// Algorithm a store compresses with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    #[default]
    Gzip,
    Brotli,
}

impl FromStr for CompressionAlgorithm {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Self::Gzip),
            "brotli" | "br" => Ok(Self::Brotli),
            other => Err(CompressionError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// What was actually applied to a payload, as recorded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    #[default]
    None,
    Gzip,
    Brotli,
}

impl From<CompressionAlgorithm> for CompressionKind {
    fn from(algorithm: CompressionAlgorithm) -> Self {
        match algorithm {
            CompressionAlgorithm::Gzip => Self::Gzip,
            CompressionAlgorithm::Brotli => Self::Brotli,
        }
    }
}

impl std::fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Gzip => write!(f, "gzip"),
            Self::Brotli => write!(f, "brotli"),
        }
    }
}

/// Compression settings derived from the store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    pub algorithm: CompressionAlgorithm,
    /// Payloads shorter than this are stored as-is.
    pub min_bytes: usize,
    /// gzip 0-9, brotli 0-11; clamped per algorithm.
    pub level: u32,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Gzip,
            min_bytes: 1024,
            level: 6,
        }
    }
}

/// Output of the compression stage.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub applied: bool,
    pub kind: CompressionKind,
    pub original_size: usize,
}

impl Compressed {
    #[must_use]
    pub fn stats(&self) -> CompressionStats {
        CompressionStats::new(self.original_size, self.bytes.len())
    }
}

/// Compress `data` if it reaches the policy threshold.
pub fn compress(data: &[u8], policy: &CompressionPolicy) -> Result<Compressed, CompressionError> {
    if data.len() < policy.min_bytes {
        return Ok(Compressed {
            bytes: data.to_vec(),
            applied: false,
            kind: CompressionKind::None,
            original_size: data.len(),
        });
    }

    let bytes = match policy.algorithm {
        CompressionAlgorithm::Gzip => gzip_encode(data, policy.level)?,
        CompressionAlgorithm::Brotli => brotli_encode(data, policy.level)?,
    };

    Ok(Compressed {
        bytes,
        applied: true,
        kind: policy.algorithm.into(),
        original_size: data.len(),
    })
}

/// Exact inverse of [`compress`]. A corrupt stream is an error, never a
/// partial result.
///
/// At most `max_size` bytes are inflated; a stream that expands further is
/// rejected instead of being read to the end.
pub fn decompress(
    data: &[u8],
    kind: CompressionKind,
    max_size: usize,
) -> Result<Vec<u8>, CompressionError> {
    match kind {
        CompressionKind::None => {
            if data.len() > max_size {
                return Err(oversized("none", max_size));
            }
            Ok(data.to_vec())
        }
        CompressionKind::Gzip => read_bounded("gzip", GzDecoder::new(data), data.len(), max_size),
        CompressionKind::Brotli => read_bounded(
            "brotli",
            brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE),
            data.len(),
            max_size,
        ),
    }
}

fn read_bounded<R: Read>(
    name: &str,
    decoder: R,
    input_len: usize,
    max_size: usize,
) -> Result<Vec<u8>, CompressionError> {
    let limit = u64::try_from(max_size).unwrap_or(u64::MAX).saturating_add(1);
    let mut out = Vec::with_capacity(input_len.saturating_mul(4).min(max_size));
    decoder
        .take(limit)
        .read_to_end(&mut out)
        .map_err(|e| CompressionError::DecompressFailed(format!("{name}: {e}")))?;
    if out.len() > max_size {
        return Err(oversized(name, max_size));
    }
    Ok(out)
}

fn oversized(name: &str, max_size: usize) -> CompressionError {
    CompressionError::DecompressFailed(format!("{name}: output exceeds {max_size} bytes"))
}

fn gzip_encode(data: &[u8], level: u32) -> Result<Vec<u8>, CompressionError> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(data.len() / 2),
        flate2::Compression::new(level.min(9)),
    );
    encoder
        .write_all(data)
        .map_err(|e| CompressionError::CompressFailed(format!("gzip: {e}")))?;
    encoder
        .finish()
        .map_err(|e| CompressionError::CompressFailed(format!("gzip: {e}")))
}

fn brotli_encode(data: &[u8], level: u32) -> Result<Vec<u8>, CompressionError> {
    let mut writer = brotli::CompressorWriter::new(
        Vec::with_capacity(data.len() / 2),
        BROTLI_BUFFER_SIZE,
        level.min(11),
        BROTLI_LG_WINDOW,
    );
    writer
        .write_all(data)
        .map_err(|e| CompressionError::CompressFailed(format!("brotli: {e}")))?;
    writer
        .flush()
        .map_err(|e| CompressionError::CompressFailed(format!("brotli: {e}")))?;
    Ok(writer.into_inner())
}

/// Compression statistics for a single operation.
#[derive(Debug, Clone, Copy)]
pub struct CompressionStats {
    /// Original size in bytes
    pub original_bytes: usize,
    /// Compressed size in bytes
    pub compressed_bytes: usize,
    /// Compression ratio (original / compressed)
    pub ratio: f64,
    /// Space saved as a fraction (0.0 - 1.0, negative if the payload grew)
    pub savings: f64,
}

impl CompressionStats {
    #[must_use]
    pub fn new(original_bytes: usize, compressed_bytes: usize) -> Self {
        let ratio = if compressed_bytes > 0 {
            original_bytes as f64 / compressed_bytes as f64
        } else {
            0.0
        };
        let savings = if original_bytes > 0 {
            1.0 - (compressed_bytes as f64 / original_bytes as f64)
        } else {
            0.0
        };
        Self {
            original_bytes,
            compressed_bytes,
            ratio,
            savings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy(algorithm: CompressionAlgorithm, min_bytes: usize) -> CompressionPolicy {
        CompressionPolicy { algorithm, min_bytes, level: 6 }
    }

    fn game_state_bytes() -> Vec<u8> {
        let state = json!({
            "inventory": (0..100).map(|i| json!({
                "slot": i,
                "item": "health_potion",
                "quantity": i % 5,
                "acquired_at": "2025-01-01T00:00:00Z",
            })).collect::<Vec<_>>()
        });
        serde_json::to_vec(&state).unwrap()
    }

    #[test]
    fn test_gzip_roundtrip() {
        let data = game_state_bytes();
        let out = compress(&data, &policy(CompressionAlgorithm::Gzip, 1024)).unwrap();

        assert!(out.applied);
        assert_eq!(out.kind, CompressionKind::Gzip);
        assert_eq!(out.original_size, data.len());
        assert_eq!(decompress(&out.bytes, out.kind, data.len()).unwrap(), data);
    }

    #[test]
    fn test_brotli_roundtrip() {
        let data = game_state_bytes();
        let out = compress(&data, &policy(CompressionAlgorithm::Brotli, 1024)).unwrap();

        assert!(out.applied);
        assert_eq!(out.kind, CompressionKind::Brotli);
        assert_eq!(decompress(&out.bytes, out.kind, data.len()).unwrap(), data);
    }

    #[test]
    fn test_threshold_boundary() {
        let p = policy(CompressionAlgorithm::Gzip, 1024);

        let below = vec![b'x'; 1023];
        let out = compress(&below, &p).unwrap();
        assert!(!out.applied);
        assert_eq!(out.kind, CompressionKind::None);
        assert_eq!(out.bytes, below);

        let at = vec![b'x'; 1024];
        let out = compress(&at, &p).unwrap();
        assert!(out.applied);
        assert!(out.bytes.len() < at.len());
    }

    #[test]
    fn test_repetitive_json_compresses_well() {
        let data = game_state_bytes();
        let out = compress(&data, &policy(CompressionAlgorithm::Gzip, 0)).unwrap();
        let stats = out.stats();

        assert!(stats.savings > 0.5, "Expected >50% savings, got {:.1}%", stats.savings * 100.0);
        assert!(stats.ratio > 2.0);
    }

    #[test]
    fn test_corrupt_gzip_stream_is_error() {
        let data = game_state_bytes();
        let mut out = compress(&data, &policy(CompressionAlgorithm::Gzip, 0)).unwrap();
        let mid = out.bytes.len() / 2;
        out.bytes.truncate(mid);

        assert!(matches!(
            decompress(&out.bytes, CompressionKind::Gzip, data.len()),
            Err(CompressionError::DecompressFailed(_))
        ));
    }

    #[test]
    fn test_kind_mismatch_is_error() {
        let data = game_state_bytes();
        let out = compress(&data, &policy(CompressionAlgorithm::Brotli, 0)).unwrap();
        assert!(decompress(&out.bytes, CompressionKind::Gzip, data.len()).is_err());
    }

    #[test]
    fn test_inflation_is_bounded() {
        let zeros = vec![0u8; 4 * 1024 * 1024];
        for algorithm in [CompressionAlgorithm::Gzip, CompressionAlgorithm::Brotli] {
            let out = compress(&zeros, &policy(algorithm, 0)).unwrap();
            assert!(out.bytes.len() < 64 * 1024);

            assert!(matches!(
                decompress(&out.bytes, out.kind, 1024),
                Err(CompressionError::DecompressFailed(msg)) if msg.contains("exceeds")
            ));
            assert_eq!(decompress(&out.bytes, out.kind, zeros.len()).unwrap().len(), zeros.len());
        }
        assert!(decompress(b"abc", CompressionKind::None, 2).is_err());
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("gzip".parse::<CompressionAlgorithm>().unwrap(), CompressionAlgorithm::Gzip);
        assert_eq!(" Brotli ".parse::<CompressionAlgorithm>().unwrap(), CompressionAlgorithm::Brotli);
        assert!(matches!(
            "lzma".parse::<CompressionAlgorithm>(),
            Err(CompressionError::UnknownAlgorithm(name)) if name == "lzma"
        ));
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&CompressionKind::Brotli).unwrap(), "\"brotli\"");
        assert_eq!(serde_json::to_string(&CompressionKind::None).unwrap(), "\"none\"");
    }

    #[test]
    fn test_compression_stats_zero_sizes() {
        let stats = CompressionStats::new(0, 0);
        assert_eq!(stats.ratio, 0.0);
        assert_eq!(stats.savings, 0.0);
    }
}
