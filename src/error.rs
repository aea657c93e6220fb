// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the document store.
//!
//! Errors fall into four families:
//! - **Transport**: network, timeout, non-2xx. Retried, then surfaced or
//!   answered from the local fallback.
//! - **Integrity**: checksum mismatch, AEAD tag failure, malformed envelope.
//!   Never retried against the same bytes.
//! - **Local state**: the fallback file could not be read back.
//! - **Configuration**: rejected once, at construction.

use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;
use crate::pipeline::compression::CompressionError;
use crate::pipeline::crypto::CryptoError;

/// Data-integrity failures detected while reversing the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The AEAD tag did not verify: wrong key or tampered ciphertext.
    #[error("authentication tag verification failed (wrong key or tampered data)")]
    AuthenticationFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transport error during {operation}: {message}")]
    Transport { operation: &'static str, message: String },

    #[error("remote returned HTTP {code} during {operation}")]
    Status { operation: &'static str, code: u16 },

    #[error("remote {operation} timed out")]
    Timeout { operation: &'static str },

    #[error("integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("compression stage failed: {0}")]
    Compression(#[from] CompressionError),

    #[error("codec stage failed: {0}")]
    Codec(#[from] CodecError),

    #[error("local fallback at {} is unreadable: {reason}", path.display())]
    CorruptLocalState { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("no version at index {0}")]
    VersionNotFound(isize),

    /// The remote write was exhausted. `saved_locally` records whether the
    /// document reached the fallback file before the error was returned.
    #[error("remote write failed (saved locally: {saved_locally}): {source}")]
    WriteFailed {
        saved_locally: bool,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Only transport-level failures are worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Status { .. } | Self::Timeout { .. }
        )
    }

    #[must_use]
    pub fn is_integrity(&self) -> bool {
        match self {
            Self::Integrity(_) => true,
            Self::WriteFailed { source, .. } => source.is_integrity(),
            _ => false,
        }
    }

    /// Which integrity check failed, for metric tags.
    #[must_use]
    pub fn integrity_stage(&self) -> Option<&'static str> {
        match self {
            Self::Integrity(IntegrityError::ChecksumMismatch { .. }) => Some("checksum"),
            Self::Integrity(IntegrityError::AuthenticationFailed) => Some("authentication"),
            Self::Integrity(IntegrityError::MalformedEnvelope(_)) => Some("envelope"),
            Self::WriteFailed { source, .. } => source.integrity_stage(),
            _ => None,
        }
    }

    /// Short label used for metric tags.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Timeout { .. } => "timeout",
            Self::Integrity(_) => "integrity",
            Self::Compression(_) => "compression",
            Self::Codec(_) => "codec",
            Self::CorruptLocalState { .. } => "corrupt_local_state",
            Self::Configuration(_) => "configuration",
            Self::VersionNotFound(_) => "version_not_found",
            Self::WriteFailed { .. } => "write_failed",
        }
    }
}

impl From<CryptoError> for StoreError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => {
                Self::Integrity(IntegrityError::AuthenticationFailed)
            }
            CryptoError::InvalidIv(msg) => {
                Self::Integrity(IntegrityError::MalformedEnvelope(msg))
            }
            other => Self::Configuration(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_retry() {
        assert!(StoreError::Timeout { operation: "fetch" }.is_retryable());
        assert!(StoreError::Status { operation: "store", code: 503 }.is_retryable());
        assert!(StoreError::Transport {
            operation: "fetch",
            message: "connection refused".into()
        }
        .is_retryable());

        assert!(!StoreError::Integrity(IntegrityError::AuthenticationFailed).is_retryable());
        assert!(!StoreError::Configuration("bad".into()).is_retryable());
    }

    #[test]
    fn test_crypto_auth_failure_maps_to_integrity() {
        let err: StoreError = CryptoError::AuthenticationFailed.into();
        assert!(err.is_integrity());
        assert_eq!(err.kind(), "integrity");
        assert_eq!(err.integrity_stage(), Some("authentication"));
    }

    #[test]
    fn test_write_failed_reports_inner_integrity() {
        let err = StoreError::WriteFailed {
            saved_locally: true,
            source: Box::new(StoreError::Integrity(IntegrityError::MalformedEnvelope(
                "x".into(),
            ))),
        };
        assert!(err.is_integrity());
        assert!(err.to_string().contains("saved locally: true"));
    }
}
