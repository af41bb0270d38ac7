// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie transport.
//!
//! | Cookie | Contents | Max-Age |
//! |--------|----------|---------|
//! | `access-token` | access JWT | 15 minutes |
//! | `refresh-token` | refresh JWT | 7 days |
//!
//! Both are `HttpOnly`, `SameSite=Strict`, `Path=/`, and `Secure` unless
//! `COOKIE_SECURE=false`.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::tokens::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};
use crate::session::TokenPair;

pub const ACCESS_COOKIE: &str = "access-token";
pub const REFRESH_COOKIE: &str = "refresh-token";

fn session_cookie(
    name: &'static str,
    value: String,
    max_age: chrono::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

/// Add both session cookies for `pair`.
pub fn set_session_cookies(jar: CookieJar, pair: &TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_COOKIE,
        pair.access_token.clone(),
        ACCESS_TOKEN_TTL,
        secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        pair.refresh_token.clone(),
        REFRESH_TOKEN_TTL,
        secure,
    ))
}

/// Overwrite both session cookies with empty, already-expired values.
///
/// Always emitted, whether or not the request carried the cookies.
pub fn clear_session_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, String::new(), chrono::Duration::zero(), secure))
        .add(session_cookie(REFRESH_COOKIE, String::new(), chrono::Duration::zero(), secure))
}

/// Non-empty value of the `refresh-token` cookie.
pub fn refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Non-empty value of the `access-token` cookie.
pub fn access_token(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
