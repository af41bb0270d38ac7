// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Refresh token (session) store.
//!
//! Each record represents one signed-in device. The raw refresh token is a
//! refresh-kind JWT handed to the client once; only its SHA-256 hex digest
//! is persisted, keyed in `refresh_tokens`, with a `user_id|hash` entry in
//! `refresh_by_user` so all of a user's sessions can be revoked at once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::database::{
    blocking, prefix_bounds, AuthDatabase, DbError, DbResult, REFRESH_BY_USER, REFRESH_TOKENS,
};
use super::users;
use crate::auth::claims::TokenKind;
use crate::auth::hasher::hash_secret;
use crate::auth::tokens::TokenSigner;
use crate::clock::SharedClock;

/// Persisted session record (keyed by token hash).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Raw refresh token returned to the caller exactly once.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn index_key(user_id: &Uuid, hash: &str) -> String {
    format!("{user_id}|{hash}")
}

// =============================================================================
// Transaction-level helpers
// =============================================================================

fn insert_in(txn: &WriteTransaction, hash: &str, record: &RefreshTokenRecord) -> DbResult<()> {
    let bytes = serde_json::to_vec(record)?;
    txn.open_table(REFRESH_TOKENS)?
        .insert(hash, bytes.as_slice())?;
    txn.open_table(REFRESH_BY_USER)?
        .insert(index_key(&record.user_id, hash).as_str(), ())?;
    Ok(())
}

/// Remove one record by hash. Returns the removed record, if any.
fn remove_in(txn: &WriteTransaction, hash: &str) -> DbResult<Option<RefreshTokenRecord>> {
    let record: Option<RefreshTokenRecord> = {
        let mut table = txn.open_table(REFRESH_TOKENS)?;
        let removed = table.remove(hash)?;
        match removed {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        }
    };

    if let Some(record) = &record {
        txn.open_table(REFRESH_BY_USER)?
            .remove(index_key(&record.user_id, hash).as_str())?;
    }
    Ok(record)
}

/// Delete every session belonging to `user_id`. Returns how many were removed.
pub(crate) fn revoke_all_in(txn: &WriteTransaction, user_id: &Uuid) -> DbResult<u64> {
    let (start, end) = prefix_bounds(&user_id.to_string());

    let keys: Vec<String> = {
        let index = txn.open_table(REFRESH_BY_USER)?;
        let mut keys = Vec::new();
        for entry in index.range(start.as_str()..end.as_str())? {
            let (key, _) = entry?;
            keys.push(key.value().to_string());
        }
        keys
    };

    let mut index = txn.open_table(REFRESH_BY_USER)?;
    let mut tokens = txn.open_table(REFRESH_TOKENS)?;
    for key in &keys {
        index.remove(key.as_str())?;
        if let Some((_, hash)) = key.split_once('|') {
            tokens.remove(hash)?;
        }
    }

    Ok(keys.len() as u64)
}

/// Mint a refresh JWT for `user_id` and persist its hash.
fn issue_in(
    txn: &WriteTransaction,
    signer: &TokenSigner,
    user_id: &Uuid,
    now: DateTime<Utc>,
) -> DbResult<IssuedRefreshToken> {
    if !users::exists_in(txn, user_id)? {
        return Err(DbError::NotFound(format!("User {user_id}")));
    }

    let minted = signer.mint(TokenKind::Refresh, *user_id)?;
    let record = RefreshTokenRecord {
        user_id: *user_id,
        expires_at: minted.expires_at,
        created_at: now,
    };
    insert_in(txn, &hash_secret(&minted.token), &record)?;

    Ok(IssuedRefreshToken {
        token: minted.token,
        expires_at: minted.expires_at,
    })
}

enum Rotation {
    Rotated(Uuid, IssuedRefreshToken),
    Missing,
    Expired,
}

// =============================================================================
// Store
// =============================================================================

/// Store for refresh-token session records.
#[derive(Clone)]
pub struct RefreshTokenStore {
    db: Arc<AuthDatabase>,
    signer: Arc<TokenSigner>,
    clock: SharedClock,
}

impl RefreshTokenStore {
    pub fn new(db: Arc<AuthDatabase>, signer: Arc<TokenSigner>, clock: SharedClock) -> Self {
        Self { db, signer, clock }
    }

    /// Start a new session for `user_id` and return the raw refresh token.
    pub async fn issue(&self, user_id: Uuid) -> DbResult<IssuedRefreshToken> {
        let signer = Arc::clone(&self.signer);
        let now = self.clock.now();
        blocking(&self.db, move |db| {
            db.write(|txn| issue_in(txn, &signer, &user_id, now))
        })
        .await
    }

    /// Look up the session record for a raw token.
    pub async fn lookup(&self, raw: &str) -> DbResult<Option<RefreshTokenRecord>> {
        let hash = hash_secret(raw);
        blocking(&self.db, move |db| {
            db.read(|txn| {
                let table = txn.open_table(REFRESH_TOKENS)?;
                let record = match table.get(hash.as_str())? {
                    Some(guard) => Some(serde_json::from_slice(guard.value())?),
                    None => None,
                };
                Ok(record)
            })
        })
        .await
    }

    /// End one session. Absent tokens are not an error.
    ///
    /// Returns whether a record was actually removed.
    pub async fn revoke(&self, raw: &str) -> DbResult<bool> {
        let hash = hash_secret(raw);
        blocking(&self.db, move |db| {
            db.write(|txn| Ok(remove_in(txn, &hash)?.is_some()))
        })
        .await
    }

    /// End every session of `user_id`.
    pub async fn revoke_all(&self, user_id: Uuid) -> DbResult<u64> {
        blocking(&self.db, move |db| db.write(|txn| revoke_all_in(txn, &user_id))).await
    }

    /// Exchange a live refresh token for a new one.
    ///
    /// The presented record is deleted and its replacement inserted in one
    /// transaction, so a token can be rotated at most once. An expired
    /// record is removed and reported as `Expired`.
    pub async fn rotate(&self, raw: &str) -> DbResult<(Uuid, IssuedRefreshToken)> {
        let hash = hash_secret(raw);
        let signer = Arc::clone(&self.signer);
        let now = self.clock.now();

        let outcome = blocking(&self.db, move |db| {
            db.write(|txn| {
                let Some(record) = remove_in(txn, &hash)? else {
                    return Ok(Rotation::Missing);
                };
                if record.is_expired(now) {
                    return Ok(Rotation::Expired);
                }
                let issued = issue_in(txn, &signer, &record.user_id, now)?;
                Ok(Rotation::Rotated(record.user_id, issued))
            })
        })
        .await?;

        match outcome {
            Rotation::Rotated(user_id, issued) => Ok((user_id, issued)),
            Rotation::Missing => Err(DbError::NotFound("Refresh token".to_string())),
            Rotation::Expired => Err(DbError::Expired("Refresh token".to_string())),
        }
    }

    /// Delete every record whose expiry is at or before the moment this
    /// sweep started. Records issued later always have a later expiry.
    pub async fn prune_expired(&self) -> DbResult<u64> {
        let cutoff = self.clock.now();
        blocking(&self.db, move |db| {
            db.write(|txn| {
                let expired: Vec<String> = {
                    let table = txn.open_table(REFRESH_TOKENS)?;
                    let mut expired = Vec::new();
                    for entry in table.iter()? {
                        let (hash, value) = entry?;
                        let record: RefreshTokenRecord = serde_json::from_slice(value.value())?;
                        if record.is_expired(cutoff) {
                            expired.push(hash.value().to_string());
                        }
                    }
                    expired
                };

                let mut pruned = 0;
                for hash in &expired {
                    if remove_in(txn, hash)?.is_some() {
                        pruned += 1;
                    }
                }
                Ok(pruned)
            })
        })
        .await
    }

    /// Number of live sessions for a user.
    pub async fn count_for_user(&self, user_id: Uuid) -> DbResult<u64> {
        let (start, end) = prefix_bounds(&user_id.to_string());
        blocking(&self.db, move |db| {
            db.read(|txn| {
                let index = txn.open_table(REFRESH_BY_USER)?;
                let mut count = 0;
                for entry in index.range(start.as_str()..end.as_str())? {
                    entry?;
                    count += 1;
                }
                Ok(count)
            })
        })
        .await
    }
}
