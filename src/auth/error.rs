// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! The variants record why a request was rejected so it can be logged, but
//! every rejection renders the same 401 body. Callers never learn whether a
//! token was missing, forged, expired or belonged to a deleted account.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::tokens::TokenError;

/// Authentication error type.
#[derive(Debug)]
pub enum AuthError {
    /// Neither an `access-token` cookie nor an `Authorization` header
    MissingCredential,
    /// `Authorization` header present but not `Bearer <token>`
    InvalidAuthHeader,
    /// Token failed verification
    InvalidToken(TokenError),
    /// Token is valid but its subject no longer exists
    UnknownUser,
    /// Shared-secret check for scheduled jobs failed
    InvalidCronSecret,
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Error code for logs. Responses only ever carry `unauthorized` or
    /// `internal_error`.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::InvalidToken(TokenError::Expired) => "token_expired",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::UnknownUser => "unknown_user",
            AuthError::InvalidCronSecret => "invalid_cron_secret",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken(_)
            | AuthError::UnknownUser
            | AuthError::InvalidCronSecret => StatusCode::UNAUTHORIZED,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredential => write!(f, "No access token presented"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::InvalidToken(e) => write!(f, "Access token rejected: {e}"),
            AuthError::UnknownUser => write!(f, "Token subject no longer exists"),
            AuthError::InvalidCronSecret => write!(f, "Cron secret mismatch"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(reason = %self, code = self.error_code(), "Request rejected");
            AuthErrorBody {
                error: "Unauthorized".to_string(),
                error_code: "unauthorized".to_string(),
            }
        } else {
            tracing::error!(error = %self, "Authentication failed internally");
            AuthErrorBody {
                error: "Internal server error".to_string(),
                error_code: self.error_code().to_string(),
            }
        };
        (status, Json(body)).into_response()
    }
}
