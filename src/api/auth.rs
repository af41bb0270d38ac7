// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-up, sign-in and session cookie endpoints.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use super::extract::ApiJson;
use crate::{
    auth::cookies,
    error::ApiError,
    models::{
        validate_password, ForgotPasswordRequest, MessageResponse, ResetPasswordRequest,
        SignInRequest, SignInResponse, SignUpRequest, VerifyEmailQuery,
    },
    session::SessionError,
    state::AppState,
};

pub const SIGNUP_MESSAGE: &str =
    "Signup successful. Please check your email to verify your account.";
pub const SIGNUP_DEGRADED_MESSAGE: &str =
    "Signup successful, but we failed to send a verification email. Please try logging in to resend it.";
pub const SIGNIN_MESSAGE: &str = "Login successful.";
pub const REFRESH_MESSAGE: &str = "Session refreshed.";
pub const LOGOUT_MESSAGE: &str = "Logged out.";
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If the account exists, a password reset e-mail will be sent.";
pub const RESET_PASSWORD_MESSAGE: &str = "Password reset. Please log in.";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";

#[utoipa::path(
    post,
    path = "/api/signup",
    request_body = SignUpRequest,
    tag = "Auth",
    responses(
        (status = 201, body = MessageResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or username already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignUpRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let registration = request.validate()?;
    let outcome = state.engine.register(registration).await?;

    let message = if outcome.verification_email_sent {
        SIGNUP_MESSAGE
    } else {
        SIGNUP_DEGRADED_MESSAGE
    };
    Ok((StatusCode::CREATED, Json(MessageResponse::ok(message))))
}

#[utoipa::path(
    post,
    path = "/api/signin",
    request_body = SignInRequest,
    tag = "Auth",
    responses(
        (status = 200, body = SignInResponse, description = "Sets access-token and refresh-token cookies"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not verified; a new verification link was sent")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(request): ApiJson<SignInRequest>,
) -> Result<(CookieJar, Json<SignInResponse>), ApiError> {
    let identifier = request.identifier.trim().to_lowercase();
    let pair = state.engine.login(&identifier, &request.password).await?;

    let jar = cookies::set_session_cookies(jar, &pair, state.config.cookie_secure);
    Ok((
        jar,
        Json(SignInResponse {
            success: true,
            message: SIGNIN_MESSAGE.to_string(),
            access_token: pair.access_token,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/refresh",
    tag = "Auth",
    responses(
        (status = 200, body = MessageResponse, description = "Rotates both session cookies"),
        (status = 401, description = "Missing, expired or already used refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    let raw = cookies::refresh_token(&jar).ok_or(SessionError::Unauthorized)?;
    let pair = state.engine.refresh(&raw).await?;

    let jar = cookies::set_session_cookies(jar, &pair, state.config.cookie_secure);
    Ok((jar, Json(MessageResponse::ok(REFRESH_MESSAGE))))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "Auth",
    responses((status = 200, body = MessageResponse, description = "Clears session cookies"))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    let raw = cookies::refresh_token(&jar);
    state.engine.logout(raw.as_deref()).await?;

    let jar = cookies::clear_session_cookies(jar, state.config.cookie_secure);
    Ok((jar, Json(MessageResponse::ok(LOGOUT_MESSAGE))))
}

#[utoipa::path(
    get,
    path = "/api/verify-email",
    params(VerifyEmailQuery),
    tag = "Auth",
    responses(
        (status = 303, description = "Verified and signed in; redirects to the app"),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    jar: CookieJar,
    query: Result<Query<VerifyEmailQuery>, QueryRejection>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let token = query
        .ok()
        .map(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request(INVALID_TOKEN_MESSAGE))?;
    let (_, pair) = state.engine.verify_email(&token).await?;

    let jar = cookies::set_session_cookies(jar, &pair, state.config.cookie_secure);
    Ok((jar, Redirect::to(&state.config.app_url)))
}

#[utoipa::path(
    post,
    path = "/api/forgot-password",
    request_body = ForgotPasswordRequest,
    tag = "Auth",
    responses((status = 200, body = MessageResponse))
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let identifier = request.identifier.trim().to_lowercase();
    state.engine.forgot_password(&identifier).await?;
    Ok(Json(MessageResponse::ok(FORGOT_PASSWORD_MESSAGE)))
}

#[utoipa::path(
    post,
    path = "/api/reset-password",
    request_body = ResetPasswordRequest,
    tag = "Auth",
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, description = "Weak password, or invalid or expired token")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_password(&request.password)?;
    state
        .engine
        .reset_password(&request.token, &request.password)
        .await?;
    Ok(Json(MessageResponse::ok(RESET_PASSWORD_MESSAGE)))
}
