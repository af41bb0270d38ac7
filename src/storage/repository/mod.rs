// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the credential database.
//!
//! Each module exposes an async store for callers plus `*_in` helpers that
//! operate on an open write transaction, so compound operations can span
//! several stores atomically.

pub mod action_tokens;
pub mod refresh_tokens;
pub mod users;

pub use action_tokens::{ActionKind, ActionTokenRecord, ActionTokenStore, ACTION_TOKEN_TTL};
pub use refresh_tokens::{IssuedRefreshToken, RefreshTokenRecord, RefreshTokenStore};
pub use users::{canonical_identifier, NewUser, StoredUser, UserProfile, UserRepository};
