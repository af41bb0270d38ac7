// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    auth::{cookies, Auth},
    error::ApiError,
    models::MessageResponse,
    state::AppState,
    storage::UserProfile,
};

/// Current user profile. Requires authentication.
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Users",
    responses(
        (status = 200, body = UserProfile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_current_user(Auth(user): Auth) -> Json<UserProfile> {
    Json(user.user)
}

/// Delete the caller's account and every session and pending link.
#[utoipa::path(
    delete,
    path = "/api/me",
    tag = "Users",
    responses(
        (status = 200, body = MessageResponse, description = "Account removed; cookies cleared"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn delete_current_user(
    State(state): State<AppState>,
    Auth(user): Auth,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    state.engine.delete_account(user.user_id()).await?;

    let jar = cookies::clear_session_cookies(jar, state.config.cookie_secure);
    Ok((jar, Json(MessageResponse::ok("Account deleted."))))
}
