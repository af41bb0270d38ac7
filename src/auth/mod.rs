// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Token primitives and the Auth Gate.
//!
//! ## Token Families
//!
//! - Access token: HS256 JWT, 15 minutes, `access-token` cookie or bearer
//! - Refresh token: HS256 JWT under a separate key, 7 days, stored hashed
//! - Action tokens: opaque random strings, stored hashed, single use
//!
//! ## Security
//!
//! - Raw tokens are never persisted; lookups go through SHA-256 digests
//! - Every gate rejection returns the same 401 body
//! - Verification has no clock-skew leeway

pub mod claims;
pub mod cookies;
pub mod error;
pub mod extractor;
pub mod hasher;
pub mod middleware;
pub mod tokens;

pub use claims::{AuthenticatedUser, TokenClaims, TokenKind};
pub use error::AuthError;
pub use extractor::{Auth, CronAuth};
pub use tokens::{TokenError, TokenSettings, TokenSigner};
