// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User account repository.
//!
//! Users are stored as JSON under their UUID in `users`; the
//! `users_by_email` and `users_by_username` tables hold canonical
//! identifier → user_id lookups and enforce uniqueness.
//!
//! Deleting a user cascades to every refresh token and action token owned
//! by that user inside the same write transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;
use uuid::Uuid;

use super::super::database::{
    blocking, AuthDatabase, DbError, DbResult, USERS, USERS_BY_EMAIL, USERS_BY_USERNAME,
};
use super::{action_tokens, refresh_tokens};
use crate::clock::SharedClock;

/// Canonical form of an email or username used for storage and lookup.
///
/// NFKC-normalized, trimmed and lowercased, so visually identical
/// identifiers cannot register twice.
pub fn canonical_identifier(raw: &str) -> String {
    raw.nfkc().collect::<String>().trim().to_lowercase()
}

/// User record as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    pub id: Uuid,
    pub name: String,
    /// Canonical (lowercased) username
    pub username: String,
    /// Canonical (lowercased) email
    pub email: String,
    /// bcrypt hash; `None` for accounts that cannot sign in with a password
    pub(crate) password_hash: Option<String>,
    /// When the email address was verified (`None` = unverified)
    pub email_verified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn is_verified(&self) -> bool {
        self.email_verified.is_some()
    }

    pub(crate) fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    /// Public projection without credential material.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            email_verified: self.email_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// User profile returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserProfile {
    /// User identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Unique handle
    pub username: String,
    /// Email address
    pub email: String,
    /// When the email address was verified
    pub email_verified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
}

// =============================================================================
// Transaction-level helpers
// =============================================================================

fn decode(bytes: &[u8]) -> DbResult<StoredUser> {
    Ok(serde_json::from_slice(bytes)?)
}

fn load<T>(table: &T, user_id: &Uuid) -> DbResult<Option<StoredUser>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let key = user_id.to_string();
    match table.get(key.as_str())? {
        Some(guard) => decode(guard.value()).map(Some),
        None => Ok(None),
    }
}

fn store(txn: &WriteTransaction, user: &StoredUser) -> DbResult<()> {
    let bytes = serde_json::to_vec(user)?;
    let mut table = txn.open_table(USERS)?;
    table.insert(user.id.to_string().as_str(), bytes.as_slice())?;
    Ok(())
}

/// Fetch a user inside a write transaction.
pub(crate) fn get_in(txn: &WriteTransaction, user_id: &Uuid) -> DbResult<StoredUser> {
    let table = txn.open_table(USERS)?;
    load(&table, user_id)?.ok_or_else(|| DbError::NotFound(format!("User {user_id}")))
}

pub(crate) fn exists_in(txn: &WriteTransaction, user_id: &Uuid) -> DbResult<bool> {
    let table = txn.open_table(USERS)?;
    let key = user_id.to_string();
    let exists = table.get(key.as_str())?.is_some();
    Ok(exists)
}

/// Insert a new user, failing with `Conflict` if the email or username is taken.
pub(crate) fn insert_in(
    txn: &WriteTransaction,
    new_user: NewUser,
    now: DateTime<Utc>,
) -> DbResult<StoredUser> {
    let email = canonical_identifier(&new_user.email);
    let username = canonical_identifier(&new_user.username);

    let user = StoredUser {
        id: Uuid::new_v4(),
        name: new_user.name,
        username,
        email,
        password_hash: new_user.password_hash,
        email_verified: None,
        created_at: now,
        updated_at: now,
    };
    let id = user.id.to_string();

    {
        let mut by_email = txn.open_table(USERS_BY_EMAIL)?;
        if by_email.get(user.email.as_str())?.is_some() {
            return Err(DbError::Conflict { field: "email" });
        }
        by_email.insert(user.email.as_str(), id.as_str())?;
    }
    {
        let mut by_username = txn.open_table(USERS_BY_USERNAME)?;
        if by_username.get(user.username.as_str())?.is_some() {
            return Err(DbError::Conflict { field: "username" });
        }
        by_username.insert(user.username.as_str(), id.as_str())?;
    }

    store(txn, &user)?;
    Ok(user)
}

/// Set `email_verified` if it is not already set. Returns the updated user.
pub(crate) fn mark_verified_in(
    txn: &WriteTransaction,
    user_id: &Uuid,
    now: DateTime<Utc>,
) -> DbResult<StoredUser> {
    let mut user = get_in(txn, user_id)?;
    if user.email_verified.is_none() {
        user.email_verified = Some(now);
        user.updated_at = now;
        store(txn, &user)?;
    }
    Ok(user)
}

/// Replace the password hash.
pub(crate) fn set_password_in(
    txn: &WriteTransaction,
    user_id: &Uuid,
    password_hash: String,
    now: DateTime<Utc>,
) -> DbResult<StoredUser> {
    let mut user = get_in(txn, user_id)?;
    user.password_hash = Some(password_hash);
    user.updated_at = now;
    store(txn, &user)?;
    Ok(user)
}

/// Delete a user, their lookup entries and every token they own.
pub(crate) fn delete_in(txn: &WriteTransaction, user_id: &Uuid) -> DbResult<StoredUser> {
    let user = get_in(txn, user_id)?;

    txn.open_table(USERS)?.remove(user_id.to_string().as_str())?;
    txn.open_table(USERS_BY_EMAIL)?.remove(user.email.as_str())?;
    txn.open_table(USERS_BY_USERNAME)?
        .remove(user.username.as_str())?;

    refresh_tokens::revoke_all_in(txn, user_id)?;
    action_tokens::delete_all_for_user_in(txn, user_id)?;

    Ok(user)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user accounts.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<AuthDatabase>,
    clock: SharedClock,
}

impl UserRepository {
    pub fn new(db: Arc<AuthDatabase>, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// Create a user. Email and username are canonicalized before storage.
    pub async fn create(&self, new_user: NewUser) -> DbResult<StoredUser> {
        let now = self.clock.now();
        blocking(&self.db, move |db| db.write(|txn| insert_in(txn, new_user, now))).await
    }

    pub async fn get(&self, user_id: Uuid) -> DbResult<StoredUser> {
        blocking(&self.db, move |db| {
            db.read(|txn| {
                let table = txn.open_table(USERS)?;
                load(&table, &user_id)?.ok_or_else(|| DbError::NotFound(format!("User {user_id}")))
            })
        })
        .await
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<StoredUser>> {
        self.find_via(USERS_BY_EMAIL, canonical_identifier(email))
            .await
    }

    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<StoredUser>> {
        self.find_via(USERS_BY_USERNAME, canonical_identifier(username))
            .await
    }

    /// Resolve a login identifier: anything containing `@` is an email,
    /// everything else a username.
    pub async fn find_by_identifier(&self, identifier: &str) -> DbResult<Option<StoredUser>> {
        if identifier.contains('@') {
            self.find_by_email(identifier).await
        } else {
            self.find_by_username(identifier).await
        }
    }

    async fn find_via(
        &self,
        index: redb::TableDefinition<'static, &'static str, &'static str>,
        key: String,
    ) -> DbResult<Option<StoredUser>> {
        blocking(&self.db, move |db| {
            db.read(|txn| {
                let index = txn.open_table(index)?;
                let user_id = match index.get(key.as_str())? {
                    Some(guard) => guard.value().to_string(),
                    None => return Ok(None),
                };
                let user_id = Uuid::parse_str(&user_id)
                    .map_err(|e| DbError::NotFound(format!("User index entry {user_id}: {e}")))?;
                let users = txn.open_table(USERS)?;
                load(&users, &user_id)
            })
        })
        .await
    }

    /// Delete a user and cascade to their tokens.
    pub async fn delete(&self, user_id: Uuid) -> DbResult<StoredUser> {
        blocking(&self.db, move |db| db.write(|txn| delete_in(txn, &user_id))).await
    }
}
