// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret hashing and opaque token generation.
//!
//! Opaque tokens (refresh tokens, email-verification and password-reset
//! links) are high-entropy random strings, so an unsalted SHA-256 digest is
//! enough to store them for equality lookup. Never use this for passwords.

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::constant_time;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

/// Number of random bytes in an opaque token (256 bits).
const OPAQUE_TOKEN_BYTES: usize = 32;

/// SHA-256 of a raw token string, hex-encoded.
///
/// This is the only form in which tokens are persisted.
pub fn hash_secret(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a random opaque token (32 bytes, base64url without padding).
pub fn generate_opaque_token() -> Result<String, ring::error::Unspecified> {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    SystemRandom::new().fill(&mut bytes)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Constant-time comparison of two secrets.
///
/// Both sides are digested first so the comparison length never depends on
/// the caller-supplied value.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    constant_time::verify_slices_are_equal(&a, &b).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_secret("some-token"), hash_secret("some-token"));
    }

    #[test]
    fn different_inputs_different_hashes() {
        assert_ne!(hash_secret("token-a"), hash_secret("token-b"));
    }

    #[test]
    fn hash_is_sha256_hex() {
        // sha256("abc")
        assert_eq!(
            hash_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn opaque_token_is_url_safe() {
        let token = generate_opaque_token().unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        // 32 bytes -> 43 base64url chars.
        assert_eq!(token.len(), 43);
    }

    #[test]
    fn opaque_tokens_are_unique() {
        let a = generate_opaque_token().unwrap();
        let b = generate_opaque_token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn secrets_match_compares_values() {
        assert!(secrets_match("cron-secret-value", "cron-secret-value"));
        assert!(!secrets_match("cron-secret-value", "cron-secret-valuf"));
        assert!(!secrets_match("", "cron-secret-value"));
        assert!(!secrets_match("cron-secret-value-longer", "cron-secret-value"));
        assert!(secrets_match("", ""));
    }
}
