// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Storage
//!
//! Persistent storage for user accounts, sessions and single-use action
//! tokens, kept in one embedded redb database (`$DATA_DIR/auth.redb`).
//!
//! ## Security Model
//!
//! - Raw refresh and action tokens are never written; only their SHA-256
//!   hex digests are stored
//! - Password hashes stay inside [`StoredUser`] and are never part of a
//!   [`UserProfile`]
//! - Every multi-record change (user delete cascade, token redemption plus
//!   its effect, password reset plus session revocation) runs in a single
//!   write transaction

pub mod database;
pub mod repository;

pub use database::{AuthDatabase, DbError, DbResult};
pub use repository::{
    canonical_identifier, ActionKind, ActionTokenStore, IssuedRefreshToken, NewUser,
    RefreshTokenRecord, RefreshTokenStore, StoredUser, UserProfile, UserRepository,
};
