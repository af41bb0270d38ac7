// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! bcrypt password hashing, run on the blocking pool.

/// Plaintext hashed once at startup to produce the dummy hash used when a
/// login names an unknown user.
const DUMMY_PASSWORD: &str = "timing-equalizer-not-a-password";

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("hashing task failed: {0}")]
    Task(String),
}

/// Password hasher with a configurable cost factor.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, cost)?;
        Ok(Self { cost, dummy_hash })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password.
    pub async fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let plaintext = plaintext.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
            .map_err(PasswordError::from)
    }

    /// Check `plaintext` against `hash`.
    ///
    /// With no stored hash the dummy hash is checked instead and the result
    /// is always `false`, so unknown users cost the same as wrong passwords.
    pub async fn verify(&self, plaintext: &str, hash: Option<&str>) -> Result<bool, PasswordError> {
        let plaintext = plaintext.to_owned();
        let (target, real) = match hash {
            Some(hash) => (hash.to_owned(), true),
            None => (self.dummy_hash.clone(), false),
        };

        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &target))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))??;

        Ok(real && matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = PasswordHasher::new(4).unwrap();
        let hash = hasher.hash("Abcd1234").await.unwrap();
        assert!(hash.starts_with("$2"));
        assert!(hasher.verify("Abcd1234", Some(&hash)).await.unwrap());
        assert!(!hasher.verify("abcd1234", Some(&hash)).await.unwrap());
    }

    #[tokio::test]
    async fn missing_hash_never_matches() {
        let hasher = PasswordHasher::new(4).unwrap();
        assert!(!hasher.verify(DUMMY_PASSWORD, None).await.unwrap());
    }
}
