// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The transform pipeline between a serialized document and its envelope.
//!
//! ```text
//! write:  serialized ─┬─ checksum ──────────────────────────┐
//!                     └─ compress? ─ encrypt? ─ base64 ─ Envelope
//! read:   Envelope ─ base64 ─ decrypt? ─ decompress? ─ verify checksum ─ serialized
//! ```
//!
//! Each stage is a pure function in its own module; [`Pipeline`] only holds
//! the per-store policy that decides which stages run.

pub mod checksum;
pub mod compression;
pub mod crypto;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::envelope::{Envelope, EnvelopeMetadata};
use crate::error::{IntegrityError, StoreError};
use compression::{CompressionError, CompressionKind, CompressionPolicy, CompressionStats};
use crypto::{CryptoError, Keyring};

/// Result of sealing a document.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub envelope: Envelope,
    pub stats: CompressionStats,
}

/// Stage selection for one store instance.
#[derive(Debug, Clone)]
pub struct Pipeline {
    compression: Option<CompressionPolicy>,
    keyring: Option<Arc<Keyring>>,
    validate_checksum: bool,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        compression: Option<CompressionPolicy>,
        keyring: Option<Arc<Keyring>>,
        validate_checksum: bool,
    ) -> Self {
        Self {
            compression,
            keyring,
            validate_checksum,
        }
    }

    /// Pass-through pipeline: no compression, no encryption, checksums on.
    #[must_use]
    pub fn plain() -> Self {
        Self::new(None, None, true)
    }

    #[must_use]
    pub fn encrypts(&self) -> bool {
        self.keyring.is_some()
    }

    /// Checksum → compress → encrypt → envelope.
    pub fn seal(&self, serialized: &[u8], timestamp: i64, version_index: u64) -> Result<Sealed, StoreError> {
        let checksum = checksum::checksum(serialized);

        let compressed = match &self.compression {
            Some(policy) => compression::compress(serialized, policy)?,
            None => compression::Compressed {
                bytes: serialized.to_vec(),
                applied: false,
                kind: CompressionKind::None,
                original_size: serialized.len(),
            },
        };
        let stats = compressed.stats();

        let mut metadata = EnvelopeMetadata {
            timestamp,
            checksum,
            compressed: compressed.applied,
            compression_type: compressed.kind,
            original_size: compressed.original_size,
            encrypted: false,
            iv: None,
            auth_tag: None,
            salt: None,
            version_index,
        };

        let payload = match &self.keyring {
            Some(keyring) => {
                let sealed = keyring.encrypt(&compressed.bytes)?;
                metadata.encrypted = true;
                metadata.iv = Some(STANDARD.encode(sealed.iv));
                metadata.auth_tag = Some(STANDARD.encode(sealed.auth_tag));
                metadata.salt = Some(STANDARD.encode(keyring.salt()));
                sealed.ciphertext
            }
            None => compressed.bytes,
        };

        debug!(
            original = stats.original_bytes,
            stored = payload.len(),
            compressed = metadata.compressed,
            encrypted = metadata.encrypted,
            "Sealed document"
        );

        Ok(Sealed {
            envelope: Envelope::new(&payload, metadata),
            stats,
        })
    }

    /// Envelope → decrypt → decompress → verify. Returns the serialized
    /// document bytes.
    pub fn open(&self, envelope: &Envelope) -> Result<Vec<u8>, StoreError> {
        let meta = &envelope.metadata;
        meta.validate()?;
        let payload = envelope.payload()?;

        let decrypted = if meta.encrypted {
            let keyring = self.keyring.as_ref().ok_or(CryptoError::MissingKey)?;
            let iv = decode_field("iv", meta.iv.as_deref())?;
            let tag = decode_field("authTag", meta.auth_tag.as_deref())?;
            let salt = match meta.salt.as_deref() {
                Some(encoded) => Some(decode_field("salt", Some(encoded))?),
                None => None,
            };
            keyring.decrypt(salt.as_deref(), &payload, &iv, &tag)?
        } else {
            payload
        };

        let serialized = if meta.compressed {
            let inflated =
                compression::decompress(&decrypted, meta.compression_type, meta.original_size)?;
            if inflated.len() != meta.original_size {
                return Err(CompressionError::DecompressFailed(format!(
                    "inflated to {} bytes, envelope says {}",
                    inflated.len(),
                    meta.original_size
                ))
                .into());
            }
            inflated
        } else {
            decrypted
        };

        if self.validate_checksum && !checksum::validate(&serialized, &meta.checksum) {
            return Err(IntegrityError::ChecksumMismatch {
                expected: meta.checksum.clone(),
                actual: checksum::checksum(&serialized),
            }
            .into());
        }

        Ok(serialized)
    }
}

fn decode_field(name: &str, value: Option<&str>) -> Result<Vec<u8>, IntegrityError> {
    let encoded = value.ok_or_else(|| IntegrityError::MalformedEnvelope(format!("missing {name}")))?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| IntegrityError::MalformedEnvelope(format!("{name} is not base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use compression::CompressionAlgorithm;

    fn keyring() -> Arc<Keyring> {
        Arc::new(Keyring::new("pipeline-test", 4).unwrap())
    }

    fn big_payload() -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..200 {
            out.extend_from_slice(format!("{{\"tile\":{i},\"terrain\":\"grass\"}},").as_bytes());
        }
        out
    }

    fn gzip() -> Option<CompressionPolicy> {
        Some(CompressionPolicy {
            algorithm: CompressionAlgorithm::Gzip,
            min_bytes: 1024,
            level: 6,
        })
    }

    #[test]
    fn test_all_stage_combinations_roundtrip() {
        let data = big_payload();
        for compression in [None, gzip()] {
            for keys in [None, Some(keyring())] {
                let pipeline = Pipeline::new(compression, keys.clone(), true);
                let sealed = pipeline.seal(&data, 1, 0).unwrap();

                assert_eq!(sealed.envelope.metadata.compressed, compression.is_some());
                assert_eq!(sealed.envelope.metadata.encrypted, keys.is_some());
                assert_eq!(pipeline.open(&sealed.envelope).unwrap(), data);
            }
        }
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let pipeline = Pipeline::plain();
        let mut envelope = pipeline.seal(b"{\"hp\":10}", 1, 0).unwrap().envelope;
        let mut payload = envelope.payload().unwrap();
        payload[5] = b'9';
        envelope.data = STANDARD.encode(&payload);

        let err = pipeline.open(&envelope).unwrap_err();
        assert!(matches!(err, StoreError::Integrity(IntegrityError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_checksum_validation_can_be_disabled() {
        let pipeline = Pipeline::new(None, None, false);
        let mut envelope = pipeline.seal(b"{\"hp\":10}", 1, 0).unwrap().envelope;
        envelope.metadata.checksum = "00".repeat(32);
        assert_eq!(pipeline.open(&envelope).unwrap(), b"{\"hp\":10}");
    }

    #[test]
    fn test_encrypted_envelope_without_key_is_configuration_error() {
        let writer = Pipeline::new(None, Some(keyring()), true);
        let envelope = writer.seal(b"secret", 1, 0).unwrap().envelope;

        let reader = Pipeline::plain();
        let err = reader.open(&envelope).unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn test_tampered_ciphertext_is_integrity_error() {
        let pipeline = Pipeline::new(gzip(), Some(keyring()), true);
        let mut envelope = pipeline.seal(&big_payload(), 1, 0).unwrap().envelope;
        let mut payload = envelope.payload().unwrap();
        payload[10] ^= 0x01;
        envelope.data = STANDARD.encode(&payload);

        let err = pipeline.open(&envelope).unwrap_err();
        assert!(matches!(err, StoreError::Integrity(IntegrityError::AuthenticationFailed)));
    }

    #[test]
    fn test_inflated_size_must_match_envelope() {
        let pipeline = Pipeline::new(gzip(), None, true);
        let sealed = pipeline.seal(&big_payload(), 1, 0).unwrap().envelope;
        assert!(sealed.metadata.compressed);

        // Understated: inflation stops at the declared size.
        let mut small = sealed.clone();
        small.metadata.original_size = 100;
        let err = pipeline.open(&small).unwrap_err();
        assert!(matches!(err, StoreError::Compression(CompressionError::DecompressFailed(_))));

        // Overstated: the stream ends early.
        let mut large = sealed;
        large.metadata.original_size += 1;
        let err = pipeline.open(&large).unwrap_err();
        assert!(matches!(err, StoreError::Compression(CompressionError::DecompressFailed(_))));
    }

    #[test]
    fn test_salt_recorded_when_encrypting() {
        let keys = keyring();
        let pipeline = Pipeline::new(None, Some(keys.clone()), true);
        let meta = pipeline.seal(b"x", 1, 7).unwrap().envelope.metadata;

        assert_eq!(meta.salt.unwrap(), STANDARD.encode(keys.salt()));
        assert_eq!(meta.version_index, 7);
    }
}
