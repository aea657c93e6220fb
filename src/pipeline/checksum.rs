// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SHA-256 checksums over the serialized document.
//!
//! The checksum is taken before compression and encryption and verified
//! after both are reversed, so it catches corruption introduced anywhere
//! between the two ends, not only inside the crypto layer.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`.
#[must_use]
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check `data` against an expected hex digest (case-insensitive).
#[must_use]
pub fn validate(data: &[u8], expected_hex: &str) -> bool {
    checksum(data).eq_ignore_ascii_case(expected_hex.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_validate_accepts_uppercase() {
        let sum = checksum(b"payload").to_uppercase();
        assert!(validate(b"payload", &sum));
    }

    #[test]
    fn test_single_byte_flip_detected() {
        let original = b"{\"hp\": 100}".to_vec();
        let sum = checksum(&original);

        let mut corrupted = original.clone();
        corrupted[3] ^= 0x01;
        assert!(!validate(&corrupted, &sum));
    }
}
