// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. All types derive
//! `ToSchema` for the OpenAPI document.
//!
//! Sign-up input is validated here, before it reaches the session engine;
//! the first failing rule is reported as `ValidationFailed`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::session::{Registration, SessionError};

// =============================================================================
// Validation Rules
// =============================================================================

const NAME_LEN: (usize, usize) = (2, 15);
const USERNAME_LEN: (usize, usize) = (3, 15);
const PASSWORD_LEN: (usize, usize) = (8, 128);

fn invalid(message: &str) -> SessionError {
    SessionError::ValidationFailed(message.to_string())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, _)| !host.is_empty())
        && !domain.ends_with('.')
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignUpRequest {
    /// Display name, 2-15 characters.
    pub name: String,
    /// 3-15 characters of `a-z`, `0-9` and `_` (case-folded).
    pub username: String,
    pub email: String,
    /// 8-128 characters with a lower-case letter, an upper-case letter and a digit.
    pub password: String,
}

impl SignUpRequest {
    /// Check every field and normalise it for registration.
    pub fn validate(self) -> Result<Registration, SessionError> {
        let name = self.name.trim().to_string();
        let name_len = name.chars().count();
        if name_len < NAME_LEN.0 {
            return Err(invalid("Name should be at least 2 characters long"));
        }
        if name_len > NAME_LEN.1 {
            return Err(invalid("Name must be maximum 15 characters long"));
        }

        let email = self.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(invalid("Email must be in valid format"));
        }

        let username = self.username.trim().to_lowercase();
        let username_len = username.chars().count();
        if username_len < USERNAME_LEN.0 {
            return Err(invalid("Username must be at least 3 characters long"));
        }
        if username_len > USERNAME_LEN.1 {
            return Err(invalid("Username must be maximum 15 characters long"));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid(
                "Username can only contain lowercase letters, numbers, and underscores.",
            ));
        }

        validate_password(&self.password)?;

        Ok(Registration {
            name,
            username,
            email,
            password: self.password,
        })
    }
}

/// Password strength rule shared by sign-up and reset.
pub fn validate_password(password: &str) -> Result<(), SessionError> {
    let len = password.chars().count();
    if len < PASSWORD_LEN.0 {
        return Err(invalid("Password must be at least 8 characters long"));
    }
    if len > PASSWORD_LEN.1 {
        return Err(invalid("Password must be maximum 128 characters long"));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Err(invalid(
            "Password must contain at least one lowercase letter, one uppercase letter, and one number",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignInRequest {
    /// Email address or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    /// Email address or username.
    pub identifier: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    /// Raw token from the reset link.
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailQuery {
    pub token: String,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignInResponse {
    pub success: bool,
    pub message: String,
    /// Same value as the `access-token` cookie, for non-browser clients.
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PruneResponse {
    pub success: bool,
    /// Expired refresh tokens removed.
    pub pruned_count: u64,
    /// Expired verification and reset tokens removed.
    pub pruned_action_tokens: u64,
}
