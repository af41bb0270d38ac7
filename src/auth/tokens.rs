// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed token minting and verification (HS256).
//!
//! ## Token Families
//!
//! | Kind | Key | Lifetime |
//! |------|-----|----------|
//! | access | `JWT_ACCESS_SECRET` | 15 minutes |
//! | refresh | `JWT_REFRESH_SECRET` | 7 days |
//!
//! Both carry `sub`, `jti`, `iss`, `aud`, `iat` and `exp`. Verification
//! checks signature, issuer, audience and expiry in one call; any single
//! failure rejects the whole token.
//!
//! Expiry is evaluated against the injected [`Clock`](crate::clock::Clock)
//! rather than the system time so it can be tested deterministically.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::claims::{TokenClaims, TokenKind};
use crate::clock::SharedClock;

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);

/// Refresh token lifetime.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(7);

/// Token minting/verification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token issuer does not match")]
    IssuerMismatch,

    #[error("token audience does not match")]
    AudienceMismatch,

    #[error("token is malformed")]
    Malformed,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Keys and claim values used by [`TokenSigner`].
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
}

/// A freshly minted token plus the metadata callers persist alongside it.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Token minter and verifier.
pub struct TokenSigner {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
    audience: String,
    clock: SharedClock,
}

impl TokenSigner {
    pub fn new(settings: &TokenSettings, clock: SharedClock) -> Self {
        Self {
            access: KeyPair::from_secret(&settings.access_secret),
            refresh: KeyPair::from_secret(&settings.refresh_secret),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            clock,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of the given token kind.
    pub fn ttl(kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => ACCESS_TOKEN_TTL,
            TokenKind::Refresh => REFRESH_TOKEN_TTL,
        }
    }

    /// Mint a signed token of `kind` for `subject`.
    pub fn mint(&self, kind: TokenKind, subject: Uuid) -> Result<MintedToken, TokenError> {
        let now = self.clock.now();
        let expires_at = now + Self::ttl(kind);
        let jti = Uuid::new_v4().to_string();

        let claims = TokenClaims {
            sub: subject.to_string(),
            jti: jti.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(MintedToken {
            token,
            jti,
            // Round-trip through the claim so the persisted expiry matches
            // the token's second-granularity `exp`.
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Verify a token of `kind` and return its claims.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["sub", "exp", "iss", "aud"]);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.keys(kind).decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
                ErrorKind::InvalidAudience => TokenError::AudienceMismatch,
                _ => TokenError::Malformed,
            })?;

        let claims = data.claims;
        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.subject().is_none() {
            return Err(TokenError::Malformed);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use std::sync::Arc;

    fn settings() -> TokenSettings {
        TokenSettings {
            access_secret: "access-secret-access-secret-access-secret".to_string(),
            refresh_secret: "refresh-secret-refresh-secret-refresh-sec".to_string(),
            issuer: "auth-session-server".to_string(),
            audience: "auth-session-server".to_string(),
        }
    }

    fn signer() -> (TokenSigner, ManualClock) {
        let clock = ManualClock::default();
        (TokenSigner::new(&settings(), Arc::new(clock.clone())), clock)
    }

    #[test]
    fn verify_returns_minted_subject() {
        let (signer, _clock) = signer();
        for _ in 0..8 {
            let subject = Uuid::new_v4();
            for kind in [TokenKind::Access, TokenKind::Refresh] {
                let minted = signer.mint(kind, subject).unwrap();
                let claims = signer.verify(kind, &minted.token).unwrap();
                assert_eq!(claims.subject(), Some(subject));
                assert_eq!(claims.jti, minted.jti);
                assert_eq!(claims.iss, "auth-session-server");
                assert_eq!(claims.aud, "auth-session-server");
            }
        }
    }

    #[test]
    fn jti_is_unique() {
        let (signer, _clock) = signer();
        let subject = Uuid::new_v4();
        let a = signer.mint(TokenKind::Access, subject).unwrap();
        let b = signer.mint(TokenKind::Access, subject).unwrap();
        assert_ne!(a.jti, b.jti);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn access_token_expires_after_fifteen_minutes() {
        let (signer, clock) = signer();
        let minted = signer.mint(TokenKind::Access, Uuid::new_v4()).unwrap();

        clock.advance(Duration::minutes(14) + Duration::seconds(59));
        assert!(signer.verify(TokenKind::Access, &minted.token).is_ok());

        clock.advance(Duration::seconds(2));
        assert_eq!(
            signer.verify(TokenKind::Access, &minted.token),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn refresh_token_lives_seven_days() {
        let (signer, clock) = signer();
        let minted = signer.mint(TokenKind::Refresh, Uuid::new_v4()).unwrap();

        clock.advance(Duration::days(6));
        assert!(signer.verify(TokenKind::Refresh, &minted.token).is_ok());

        clock.advance(Duration::days(1));
        assert_eq!(
            signer.verify(TokenKind::Refresh, &minted.token),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn kinds_use_distinct_keys() {
        let (signer, _clock) = signer();
        let access = signer.mint(TokenKind::Access, Uuid::new_v4()).unwrap();
        let refresh = signer.mint(TokenKind::Refresh, Uuid::new_v4()).unwrap();

        assert_eq!(
            signer.verify(TokenKind::Refresh, &access.token),
            Err(TokenError::InvalidSignature)
        );
        assert_eq!(
            signer.verify(TokenKind::Access, &refresh.token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn issuer_mismatch_rejected() {
        let (signer, clock) = signer();
        let mut other = settings();
        other.issuer = "someone-else".to_string();
        let foreign = TokenSigner::new(&other, Arc::new(clock));

        let minted = foreign.mint(TokenKind::Access, Uuid::new_v4()).unwrap();
        assert_eq!(
            signer.verify(TokenKind::Access, &minted.token),
            Err(TokenError::IssuerMismatch)
        );
    }

    #[test]
    fn audience_mismatch_rejected() {
        let (signer, clock) = signer();
        let mut other = settings();
        other.audience = "another-service".to_string();
        let foreign = TokenSigner::new(&other, Arc::new(clock));

        let minted = foreign.mint(TokenKind::Access, Uuid::new_v4()).unwrap();
        assert_eq!(
            signer.verify(TokenKind::Access, &minted.token),
            Err(TokenError::AudienceMismatch)
        );
    }

    #[test]
    fn tampered_payload_rejected() {
        let (signer, _clock) = signer();
        let minted = signer.mint(TokenKind::Access, Uuid::new_v4()).unwrap();

        let parts: Vec<&str> = minted.token.split('.').collect();
        let forged_claims = format!(
            r#"{{"sub":"{}","jti":"x","iss":"auth-session-server","aud":"auth-session-server","iat":0,"exp":9999999999}}"#,
            Uuid::new_v4()
        );
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(forged_claims.as_bytes()),
            parts[2]
        );

        assert_eq!(
            signer.verify(TokenKind::Access, &forged),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let (signer, _clock) = signer();
        assert_eq!(
            signer.verify(TokenKind::Access, "not-a-token"),
            Err(TokenError::Malformed)
        );
    }
}
