// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated callers.
//!
//! ```rust,ignore
//! async fn me(Auth(user): Auth) -> Json<UserProfile> {
//!     Json(user.user)
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::hasher::secrets_match;
use super::middleware::authenticate;
use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// Reuses the identity attached by [`require_auth`](super::middleware::require_auth)
/// when the route sits behind it, otherwise runs the same checks itself.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let user = authenticate(&state.engine, &parts.headers).await?;
        Ok(Auth(user))
    }
}

/// Extractor for scheduled-job endpoints.
///
/// Requires `Authorization: Bearer <CRON_SECRET>`.
pub struct CronAuth;

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredential)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let presented = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        if !secrets_match(presented, &state.config.cron_secret) {
            tracing::warn!("Scheduled job called with wrong secret");
            return Err(AuthError::InvalidCronSecret);
        }

        Ok(CronAuth)
    }
}
