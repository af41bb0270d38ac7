// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session lifecycle: registration, verification, sign-in, refresh,
//! sign-out, password reset and account deletion.

pub mod engine;
pub mod error;
pub mod password;

pub use engine::{
    capitalize_words, PruneReport, RegisterOutcome, Registration, SessionEngine, TokenPair,
};
pub use error::SessionError;
pub use password::{PasswordError, PasswordHasher};
