// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded credential database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `users_by_email`: canonical email → user_id
//! - `users_by_username`: canonical username → user_id
//! - `refresh_tokens`: token hash → serialized RefreshTokenRecord
//! - `refresh_by_user`: `user_id|token_hash` → () (per-user session index)
//! - `action_tokens`: token hash → serialized ActionTokenRecord
//! - `action_by_user`: `kind|user_id` → token hash (one live token per purpose)
//!
//! redb admits a single write transaction at a time, so every compound
//! operation performed inside [`AuthDatabase::write`] is applied atomically
//! and in isolation. Dropping out of the closure with an error aborts it.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableDatabase, TableDefinition, WriteTransaction};

use crate::auth::tokens::TokenError;

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

pub(crate) const USERS_BY_EMAIL: TableDefinition<&str, &str> =
    TableDefinition::new("users_by_email");

pub(crate) const USERS_BY_USERNAME: TableDefinition<&str, &str> =
    TableDefinition::new("users_by_username");

pub(crate) const REFRESH_TOKENS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("refresh_tokens");

/// Key format: `user_id|token_hash`, so one user's sessions form a contiguous range.
pub(crate) const REFRESH_BY_USER: TableDefinition<&str, ()> =
    TableDefinition::new("refresh_by_user");

pub(crate) const ACTION_TOKENS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("action_tokens");

/// Key format: `kind|user_id`.
pub(crate) const ACTION_BY_USER: TableDefinition<&str, &str> =
    TableDefinition::new("action_by_user");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("random source failure")]
    Random,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("expired: {0}")]
    Expired(String),

    #[error("{field} already taken")]
    Conflict { field: &'static str },

    #[error("blocking task failed: {0}")]
    Task(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Prefix Helpers
// =============================================================================

/// Half-open `[start, end)` bounds covering every key that starts with `prefix|`.
///
/// `}` is the byte after `|`, so `prefix}` sorts after all `prefix|...` keys.
pub(crate) fn prefix_bounds(prefix: &str) -> (String, String) {
    (format!("{prefix}|"), format!("{prefix}}}"))
}

// =============================================================================
// AuthDatabase
// =============================================================================

/// Embedded ACID credential database.
pub struct AuthDatabase {
    db: Database,
}

impl AuthDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_EMAIL)?;
            let _ = write_txn.open_table(USERS_BY_USERNAME)?;
            let _ = write_txn.open_table(REFRESH_TOKENS)?;
            let _ = write_txn.open_table(REFRESH_BY_USER)?;
            let _ = write_txn.open_table(ACTION_TOKENS)?;
            let _ = write_txn.open_table(ACTION_BY_USER)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Credential database opened");

        Ok(Self { db })
    }

    /// Run `f` inside one write transaction.
    ///
    /// Commits if `f` succeeds, aborts otherwise; either every effect of `f`
    /// lands or none does.
    pub fn write<T>(&self, f: impl FnOnce(&WriteTransaction) -> DbResult<T>) -> DbResult<T> {
        let txn = self.db.begin_write()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.abort()?;
                Err(e)
            }
        }
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&ReadTransaction) -> DbResult<T>) -> DbResult<T> {
        let txn = self.db.begin_read()?;
        f(&txn)
    }

    /// Cheap liveness check used by the readiness probe.
    pub fn ping(&self) -> DbResult<()> {
        self.read(|txn| {
            let _ = txn.open_table(USERS)?;
            Ok(())
        })
    }
}

/// Run a blocking database closure off the async runtime.
///
/// redb I/O is synchronous; pushing it onto the blocking pool keeps request
/// tasks from stalling each other.
pub async fn blocking<T, F>(db: &Arc<AuthDatabase>, f: F) -> DbResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AuthDatabase) -> DbResult<T> + Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| DbError::Task(e.to_string()))?
}

/// Fresh database in a temporary directory. Keep the `TempDir` alive for the
/// duration of the test.
#[cfg(test)]
pub(crate) fn temp_db() -> (Arc<AuthDatabase>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = AuthDatabase::open(&dir.path().join("test.redb")).unwrap();
    (Arc::new(db), dir)
}

// =============================================================================
// Tests
// =============================================================================
