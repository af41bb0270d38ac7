// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-use action tokens (email verification, password reset).
//!
//! A user holds at most one live token per [`ActionKind`]: issuing a new one
//! replaces the previous record, so only the newest link works. Redeeming a
//! token deletes it in the same write transaction as the caller's domain
//! change, so a token is consumed exactly when its effect is committed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::database::{
    blocking, AuthDatabase, DbError, DbResult, ACTION_BY_USER, ACTION_TOKENS,
};
use super::users;
use crate::auth::hasher::{generate_opaque_token, hash_secret};
use crate::clock::SharedClock;

/// Lifetime of an action token.
pub const ACTION_TOKEN_TTL: Duration = Duration::hours(24);

/// What an action token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    EmailVerification,
    PasswordReset,
}

impl ActionKind {
    pub const ALL: [ActionKind; 2] = [ActionKind::EmailVerification, ActionKind::PasswordReset];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::EmailVerification => "email_verification",
            ActionKind::PasswordReset => "password_reset",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted action token (keyed by token hash).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionTokenRecord {
    pub user_id: Uuid,
    pub kind: ActionKind,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ActionTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

fn owner_key(kind: ActionKind, user_id: &Uuid) -> String {
    format!("{}|{user_id}", kind.as_str())
}

// =============================================================================
// Transaction-level helpers
// =============================================================================

fn get_in(txn: &WriteTransaction, hash: &str) -> DbResult<Option<ActionTokenRecord>> {
    let table = txn.open_table(ACTION_TOKENS)?;
    let record = match table.get(hash)? {
        Some(guard) => Some(serde_json::from_slice(guard.value())?),
        None => None,
    };
    Ok(record)
}

fn remove_in(txn: &WriteTransaction, hash: &str, record: &ActionTokenRecord) -> DbResult<()> {
    txn.open_table(ACTION_TOKENS)?.remove(hash)?;

    // Only drop the owner entry if it still points at this token
    let key = owner_key(record.kind, &record.user_id);
    let mut by_user = txn.open_table(ACTION_BY_USER)?;
    let points_here = matches!(by_user.get(key.as_str())?, Some(current) if current.value() == hash);
    if points_here {
        by_user.remove(key.as_str())?;
    }
    Ok(())
}

/// Replace any existing token for `(user_id, kind)` with `hash`.
fn upsert_in(txn: &WriteTransaction, hash: &str, record: &ActionTokenRecord) -> DbResult<()> {
    let key = owner_key(record.kind, &record.user_id);

    let previous: Option<String> = {
        let by_user = txn.open_table(ACTION_BY_USER)?;
        let previous = by_user.get(key.as_str())?.map(|g| g.value().to_string());
        previous
    };
    if let Some(previous) = previous {
        txn.open_table(ACTION_TOKENS)?.remove(previous.as_str())?;
    }

    let bytes = serde_json::to_vec(record)?;
    txn.open_table(ACTION_TOKENS)?
        .insert(hash, bytes.as_slice())?;
    txn.open_table(ACTION_BY_USER)?
        .insert(key.as_str(), hash)?;
    Ok(())
}

/// Delete every action token owned by `user_id`.
pub(crate) fn delete_all_for_user_in(txn: &WriteTransaction, user_id: &Uuid) -> DbResult<u64> {
    let mut removed = 0;
    for kind in ActionKind::ALL {
        let key = owner_key(kind, user_id);
        let hash: Option<String> = {
            let mut by_user = txn.open_table(ACTION_BY_USER)?;
            let hash = by_user.remove(key.as_str())?.map(|g| g.value().to_string());
            hash
        };
        if let Some(hash) = hash {
            txn.open_table(ACTION_TOKENS)?.remove(hash.as_str())?;
            removed += 1;
        }
    }
    Ok(removed)
}

enum Redemption<R> {
    Applied(Uuid, R),
    Missing,
    Expired,
}

// =============================================================================
// Store
// =============================================================================

/// Store for single-use action tokens.
#[derive(Clone)]
pub struct ActionTokenStore {
    db: Arc<AuthDatabase>,
    clock: SharedClock,
}

impl ActionTokenStore {
    pub fn new(db: Arc<AuthDatabase>, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// Issue a fresh token for `(user_id, kind)`, invalidating any previous one.
    ///
    /// Returns the raw token; only its hash is stored.
    pub async fn issue(&self, user_id: Uuid, kind: ActionKind) -> DbResult<String> {
        let raw = generate_opaque_token().map_err(|_| DbError::Random)?;
        let hash = hash_secret(&raw);
        let now = self.clock.now();
        let record = ActionTokenRecord {
            user_id,
            kind,
            expires_at: now + ACTION_TOKEN_TTL,
            created_at: now,
        };

        blocking(&self.db, move |db| {
            db.write(|txn| {
                if !users::exists_in(txn, &user_id)? {
                    return Err(DbError::NotFound(format!("User {user_id}")));
                }
                upsert_in(txn, &hash, &record)
            })
        })
        .await?;

        tracing::debug!(user_id = %user_id, kind = %kind, "Action token issued");
        Ok(raw)
    }

    /// Check that `raw` is a live token of `kind` without consuming it.
    pub async fn peek(&self, raw: &str, kind: ActionKind) -> DbResult<Uuid> {
        let hash = hash_secret(raw);
        let now = self.clock.now();
        let record: Option<ActionTokenRecord> = blocking(&self.db, move |db| {
            db.read(|txn| {
                let table = txn.open_table(ACTION_TOKENS)?;
                let record = match table.get(hash.as_str())? {
                    Some(guard) => Some(serde_json::from_slice(guard.value())?),
                    None => None,
                };
                Ok(record)
            })
        })
        .await?;

        match record {
            Some(record) if record.kind == kind && !record.is_expired(now) => Ok(record.user_id),
            Some(record) if record.kind == kind => {
                Err(DbError::Expired(format!("{kind} token")))
            }
            _ => Err(DbError::NotFound(format!("{kind} token"))),
        }
    }

    /// Consume a token of `kind` and return its owner.
    pub async fn redeem(&self, raw: &str, kind: ActionKind) -> DbResult<Uuid> {
        self.redeem_with(raw, kind, |_, _| Ok(()))
            .await
            .map(|(user_id, ())| user_id)
    }

    /// Consume a token of `kind` and run `apply` in the same transaction.
    ///
    /// If `apply` fails the whole transaction aborts and the token stays
    /// redeemable. An expired token is deleted and reported as `Expired`;
    /// an unknown token, or one of another kind, is `NotFound`.
    pub async fn redeem_with<R, F>(&self, raw: &str, kind: ActionKind, apply: F) -> DbResult<(Uuid, R)>
    where
        R: Send + 'static,
        F: FnOnce(&WriteTransaction, &Uuid) -> DbResult<R> + Send + 'static,
    {
        let hash = hash_secret(raw);
        let now = self.clock.now();

        let outcome = blocking(&self.db, move |db| {
            db.write(|txn| {
                let record = match get_in(txn, &hash)? {
                    Some(record) if record.kind == kind => record,
                    _ => return Ok(Redemption::Missing),
                };

                remove_in(txn, &hash, &record)?;
                if record.is_expired(now) {
                    return Ok(Redemption::Expired);
                }

                let applied = apply(txn, &record.user_id)?;
                Ok(Redemption::Applied(record.user_id, applied))
            })
        })
        .await?;

        match outcome {
            Redemption::Applied(user_id, applied) => {
                tracing::debug!(user_id = %user_id, kind = %kind, "Action token redeemed");
                Ok((user_id, applied))
            }
            Redemption::Missing => Err(DbError::NotFound(format!("{kind} token"))),
            Redemption::Expired => Err(DbError::Expired(format!("{kind} token"))),
        }
    }

    /// Delete every token whose expiry is at or before the sweep start.
    pub async fn prune_expired(&self) -> DbResult<u64> {
        let cutoff = self.clock.now();
        blocking(&self.db, move |db| {
            db.write(|txn| {
                let expired: Vec<(String, ActionTokenRecord)> = {
                    let table = txn.open_table(ACTION_TOKENS)?;
                    let mut expired = Vec::new();
                    for entry in table.iter()? {
                        let (hash, value) = entry?;
                        let record: ActionTokenRecord = serde_json::from_slice(value.value())?;
                        if record.is_expired(cutoff) {
                            expired.push((hash.value().to_string(), record));
                        }
                    }
                    expired
                };

                for (hash, record) in &expired {
                    remove_in(txn, hash, record)?;
                }
                Ok(expired.len() as u64)
            })
        })
        .await
    }
}
