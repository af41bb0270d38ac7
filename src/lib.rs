// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth Session Server - Credential & Session Lifecycle Service
//!
//! Password accounts with email verification, short-lived access tokens,
//! rotating refresh sessions, and single-use verification / reset links.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token signing and verification, cookies, the Auth Gate
//! - `session` - Session lifecycle engine (register, login, reset, ...)
//! - `storage` - Embedded credential database (redb)
//! - `mailer` / `providers` - Outbound email
//! - `prune` - Periodic sweep of expired tokens

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod mailer;
pub mod models;
pub mod providers;
pub mod prune;
pub mod session;
pub mod state;
pub mod storage;
