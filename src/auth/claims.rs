// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed-token claims and the authenticated identity injected by the gate.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::UserProfile;

/// Which family a signed token belongs to.
///
/// Each kind is signed with its own key and has its own lifetime, so an
/// access token can never be replayed as a refresh token or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims carried by every access and refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Unique token ID
    pub jti: String,
    /// Issuer (fixed service identifier)
    pub iss: String,
    /// Audience (fixed service identifier)
    pub aud: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

impl TokenClaims {
    /// Subject as a user ID, if it is a well-formed UUID.
    pub fn subject(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Identity attached to a request once the auth gate has let it through.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Current user profile (never includes the password hash)
    pub user: UserProfile,

    /// `jti` of the access token that authenticated this request
    #[serde(skip)]
    pub token_id: String,

    /// Access token expiration (Unix seconds)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims(sub: &str) -> TokenClaims {
        TokenClaims {
            sub: sub.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: "auth-session-server".to_string(),
            aud: "auth-session-server".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_000_900,
        }
    }

    #[test]
    fn subject_parses_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(sample_claims(&id.to_string()).subject(), Some(id));
    }

    #[test]
    fn subject_rejects_garbage() {
        assert_eq!(sample_claims("user_123").subject(), None);
    }

    #[test]
    fn token_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TokenKind::Refresh).unwrap();
        assert_eq!(json, r#""refresh""#);
        assert_eq!(TokenKind::Access.to_string(), "access");
    }
}
