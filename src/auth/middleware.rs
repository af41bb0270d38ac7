// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth Gate for Axum.
//!
//! Applied to a router subtree with
//! `axum::middleware::from_fn_with_state(state, require_auth)`. A request
//! passes only if it carries a valid access token whose subject still
//! exists; the user's profile is then attached to the request extensions
//! for the [`Auth`](super::Auth) extractor.
//!
//! The credential is read from the `access-token` cookie first, then from
//! `Authorization: Bearer <token>`. If the cookie does not verify, the
//! header is tried before the request is rejected.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use super::claims::TokenKind;
use super::cookies;
use super::tokens::TokenError;
use super::{AuthError, AuthenticatedUser};
use crate::session::{SessionEngine, SessionError};
use crate::state::AppState;

/// Bearer token from the `Authorization` header, if the header is present.
fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)?;

    Ok(Some(token.to_string()))
}

/// Every access token the request presents, cookie first.
///
/// A malformed `Authorization` header is only an error when there is no
/// cookie to fall back on.
pub fn access_credentials(headers: &HeaderMap) -> Result<Vec<String>, AuthError> {
    let mut found = Vec::with_capacity(2);
    if let Some(token) = cookies::access_token(&CookieJar::from_headers(headers)) {
        found.push(token);
    }

    match bearer_token(headers) {
        Ok(Some(token)) => found.push(token),
        Ok(None) => {}
        Err(e) if found.is_empty() => return Err(e),
        Err(_) => {}
    }

    if found.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(found)
}

/// Verify the request's access token and load the current user.
///
/// A cookie that fails verification does not mask a valid bearer header.
pub async fn authenticate(
    engine: &SessionEngine,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, AuthError> {
    let mut rejection = TokenError::Malformed;
    let mut verified = None;
    for token in access_credentials(headers)? {
        match engine.signer().verify(TokenKind::Access, &token) {
            Ok(claims) => {
                verified = Some(claims);
                break;
            }
            Err(e) => rejection = e,
        }
    }
    let claims = verified.ok_or(AuthError::InvalidToken(rejection))?;

    let user_id = claims
        .subject()
        .ok_or(AuthError::InvalidToken(TokenError::Malformed))?;

    let user = match engine.current_user(user_id).await {
        Ok(user) => user,
        Err(SessionError::NotFound(_)) => return Err(AuthError::UnknownUser),
        Err(e) => return Err(AuthError::InternalError(e.to_string())),
    };

    Ok(AuthenticatedUser {
        user,
        token_id: claims.jti,
        expires_at: claims.exp,
    })
}

/// Authentication middleware function.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state.engine, request.headers()).await {
        Ok(user) => {
            // Add authenticated user to request extensions
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::engine::tests::{active_user, harness, jane};
    use axum::http::HeaderValue;
    use chrono::Duration;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn cookie(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; access-token={token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn credential_sources() {
        assert!(matches!(
            access_credentials(&HeaderMap::new()),
            Err(AuthError::MissingCredential)
        ));
        assert_eq!(access_credentials(&bearer("abc")).unwrap(), ["abc"]);
        assert_eq!(access_credentials(&cookie("xyz")).unwrap(), ["xyz"]);

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(
            access_credentials(&basic),
            Err(AuthError::InvalidAuthHeader)
        ));

        let mut with_cookie = cookie("xyz");
        with_cookie.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(access_credentials(&with_cookie).unwrap(), ["xyz"]);
    }

    #[test]
    fn cookie_is_tried_first() {
        let mut headers = cookie("from-cookie");
        headers.extend(bearer("from-header"));
        assert_eq!(
            access_credentials(&headers).unwrap(),
            ["from-cookie", "from-header"]
        );
    }

    #[tokio::test]
    async fn stale_cookie_falls_back_to_bearer() {
        let h = harness();
        let profile = active_user(&h, jane()).await;
        let pair = h.engine.login("janed", "Abcd1234").await.unwrap();

        let mut headers = cookie("not-a-jwt");
        headers.extend(bearer(&pair.access_token));
        let user = authenticate(&h.engine, &headers).await.unwrap();
        assert_eq!(user.user_id(), profile.id);

        let mut headers = cookie("not-a-jwt");
        headers.extend(bearer("also-not-a-jwt"));
        assert!(matches!(
            authenticate(&h.engine, &headers).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn valid_token_loads_profile() {
        let h = harness();
        let profile = active_user(&h, jane()).await;
        let pair = h.engine.login("janed", "Abcd1234").await.unwrap();

        let user = authenticate(&h.engine, &bearer(&pair.access_token))
            .await
            .unwrap();
        assert_eq!(user.user_id(), profile.id);
        assert_eq!(user.user.username, "janed");
    }

    #[tokio::test]
    async fn expired_token_rejected() {
        let h = harness();
        active_user(&h, jane()).await;
        let pair = h.engine.login("janed", "Abcd1234").await.unwrap();

        h.clock.advance(Duration::minutes(16));
        assert!(matches!(
            authenticate(&h.engine, &bearer(&pair.access_token)).await,
            Err(AuthError::InvalidToken(TokenError::Expired))
        ));
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let h = harness();
        active_user(&h, jane()).await;
        let pair = h.engine.login("janed", "Abcd1234").await.unwrap();

        assert!(matches!(
            authenticate(&h.engine, &bearer(&pair.refresh_token)).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn deleted_user_rejected() {
        let h = harness();
        let profile = active_user(&h, jane()).await;
        let pair = h.engine.login("janed", "Abcd1234").await.unwrap();
        h.engine.delete_account(profile.id).await.unwrap();

        assert!(matches!(
            authenticate(&h.engine, &bearer(&pair.access_token)).await,
            Err(AuthError::UnknownUser)
        ));
    }
}
