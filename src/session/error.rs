// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session engine failure taxonomy.
//!
//! Every collaborator error (store, signer, password hasher, mailer) is
//! translated into one of these variants at the engine boundary. Nothing
//! below this layer leaks into responses.

use crate::auth::tokens::TokenError;
use crate::storage::DbError;

use super::password::PasswordError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Malformed input.
    #[error("{0}")]
    ValidationFailed(String),

    /// Email or username already registered.
    #[error("User with this {field} already exists.")]
    Conflict { field: &'static str },

    /// Bad credentials or missing/invalid session. Never says which.
    #[error("Invalid credentials.")]
    Unauthorized,

    /// Credentials are valid but the email address is not verified.
    #[error("Please check your email to verify your account and log in.")]
    Forbidden,

    /// Single-use token unknown, already used, or expired.
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("{0} not found")]
    NotFound(String),

    /// Store, signing or delivery failure. The detail is for logs only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        SessionError::Internal(detail.to_string())
    }

    /// Map a failed single-use token redemption. Unknown and expired tokens
    /// collapse into one outward kind.
    pub fn from_redemption(err: DbError) -> Self {
        match err {
            DbError::NotFound(_) | DbError::Expired(_) => SessionError::InvalidOrExpiredToken,
            other => other.into(),
        }
    }

    /// Whether this failure is a server-side fault worth logging at error level.
    pub fn is_internal(&self) -> bool {
        matches!(self, SessionError::Internal(_))
    }
}

impl From<DbError> for SessionError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { field } => SessionError::Conflict { field },
            DbError::NotFound(what) => SessionError::NotFound(what),
            DbError::Expired(_) => SessionError::InvalidOrExpiredToken,
            DbError::Token(e) => SessionError::internal(e),
            DbError::Redb(_)
            | DbError::RedbDatabase(_)
            | DbError::RedbTransaction(_)
            | DbError::RedbTable(_)
            | DbError::RedbStorage(_)
            | DbError::RedbCommit(_)
            | DbError::Serde(_)
            | DbError::Random
            | DbError::Task(_) => SessionError::internal(err),
        }
    }
}

impl From<TokenError> for SessionError {
    /// Only signing can fail on the minting path; any verification failure
    /// reaching this conversion is treated as an invalid session.
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(detail) => SessionError::Internal(detail),
            TokenError::InvalidSignature
            | TokenError::Expired
            | TokenError::IssuerMismatch
            | TokenError::AudienceMismatch
            | TokenError::Malformed => SessionError::Unauthorized,
        }
    }
}

impl From<PasswordError> for SessionError {
    fn from(err: PasswordError) -> Self {
        SessionError::internal(err)
    }
}
