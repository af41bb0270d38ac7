// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session lifecycle engine.
//!
//! Per-user state machine: `Unregistered → PendingVerification → Active`.
//!
//! - `register` creates a pending user and sends a verification link
//! - `verify_email` activates the user and signs them in
//! - `login` signs in active users; pending users get a fresh link instead
//! - `refresh` rotates a session's refresh token
//! - `forgot_password` / `reset_password` replace the password and end every
//!   session of that user
//!
//! All multi-record changes go through a single store transaction.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::SessionError;
use super::password::PasswordHasher;
use crate::auth::claims::TokenKind;
use crate::auth::tokens::TokenSigner;
use crate::clock::SharedClock;
use crate::mailer::{EmailKind, SharedMailer};
use crate::storage::database::{blocking, AuthDatabase};
use crate::storage::repository::{refresh_tokens, users};
use crate::storage::{
    ActionKind, ActionTokenStore, DbError, NewUser, RefreshTokenStore, StoredUser, UserProfile,
    UserRepository,
};

/// Access + refresh token pair handed to the transport layer.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Validated registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub user: UserProfile,
    /// `false` when the verification email could not be sent; the user can
    /// trigger a new one by signing in.
    pub verification_email_sent: bool,
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub refresh_tokens: u64,
    pub action_tokens: u64,
}

/// Title-case each space-separated word: `"jANE  doe"` → `"Jane  Doe"`.
pub fn capitalize_words(raw: &str) -> String {
    raw.to_lowercase()
        .trim()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct SessionEngine {
    db: Arc<AuthDatabase>,
    users: UserRepository,
    refresh_tokens: RefreshTokenStore,
    action_tokens: ActionTokenStore,
    signer: Arc<TokenSigner>,
    passwords: PasswordHasher,
    mailer: SharedMailer,
    clock: SharedClock,
    app_url: String,
}

impl SessionEngine {
    pub fn new(
        db: Arc<AuthDatabase>,
        signer: Arc<TokenSigner>,
        passwords: PasswordHasher,
        mailer: SharedMailer,
        clock: SharedClock,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            users: UserRepository::new(Arc::clone(&db), Arc::clone(&clock)),
            refresh_tokens: RefreshTokenStore::new(
                Arc::clone(&db),
                Arc::clone(&signer),
                Arc::clone(&clock),
            ),
            action_tokens: ActionTokenStore::new(Arc::clone(&db), Arc::clone(&clock)),
            db,
            signer,
            passwords,
            mailer,
            clock,
            app_url: app_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn database(&self) -> &Arc<AuthDatabase> {
        &self.db
    }

    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    fn verification_url(&self, token: &str) -> String {
        format!("{}/api/verify-email?token={token}", self.app_url)
    }

    fn reset_url(&self, token: &str) -> String {
        format!("{}/reset-password?token={token}", self.app_url)
    }

    // =========================================================================
    // Registration & verification
    // =========================================================================

    pub async fn register(&self, input: Registration) -> Result<RegisterOutcome, SessionError> {
        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(SessionError::Conflict { field: "email" });
        }
        if self.users.find_by_username(&input.username).await?.is_some() {
            return Err(SessionError::Conflict { field: "username" });
        }

        let password_hash = self.passwords.hash(&input.password).await?;

        // The insert re-checks uniqueness inside its transaction, so a
        // concurrent registration that slipped past the checks above still
        // surfaces as Conflict.
        let user = self
            .users
            .create(NewUser {
                name: capitalize_words(&input.name),
                username: input.username,
                email: input.email,
                password_hash: Some(password_hash),
            })
            .await?;

        info!(user_id = %user.id, "User registered");

        let verification_email_sent = match self.send_verification(&user).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Failed to send verification email");
                false
            }
        };

        Ok(RegisterOutcome {
            user: user.profile(),
            verification_email_sent,
        })
    }

    /// Issue (or replace) the user's verification token and email the link.
    async fn send_verification(&self, user: &StoredUser) -> Result<(), SessionError> {
        let token = self
            .action_tokens
            .issue(user.id, ActionKind::EmailVerification)
            .await?;
        self.mailer
            .send(
                EmailKind::Verification,
                &user.name,
                &user.email,
                &self.verification_url(&token),
            )
            .await
            .map_err(SessionError::internal)
    }

    /// Redeem an email-verification token, activate the user and sign them in.
    pub async fn verify_email(&self, raw: &str) -> Result<(UserProfile, TokenPair), SessionError> {
        let now = self.clock.now();
        let (user_id, user) = self
            .action_tokens
            .redeem_with(raw, ActionKind::EmailVerification, move |txn, user_id| {
                if !users::exists_in(txn, user_id)? {
                    return Ok(None);
                }
                users::mark_verified_in(txn, user_id, now).map(Some)
            })
            .await
            .map_err(SessionError::from_redemption)?;

        let Some(user) = user else {
            return Err(SessionError::NotFound(format!("User {user_id}")));
        };

        info!(user_id = %user.id, "Email verified");

        let pair = self.start_session(user.id).await?;
        Ok((user.profile(), pair))
    }

    // =========================================================================
    // Sign-in, refresh, sign-out
    // =========================================================================

    /// Password sign-in with an email or username.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, SessionError> {
        let user = self.users.find_by_identifier(identifier).await?;

        // Always run one bcrypt comparison so unknown users and wrong
        // passwords take the same time.
        let matched = self
            .passwords
            .verify(password, user.as_ref().and_then(StoredUser::password_hash))
            .await?;

        let user = match user {
            Some(user) if matched => user,
            _ => {
                debug!("Login rejected: unknown identifier or bad password");
                return Err(SessionError::Unauthorized);
            }
        };

        if !user.is_verified() {
            if let Err(e) = self.send_verification(&user).await {
                warn!(user_id = %user.id, error = %e, "Failed to resend verification email");
            }
            info!(user_id = %user.id, "Login blocked until email is verified");
            return Err(SessionError::Forbidden);
        }

        let pair = self.start_session(user.id).await?;
        info!(user_id = %user.id, "User signed in");
        Ok(pair)
    }

    /// Mint an access token and persist a new refresh-token session.
    async fn start_session(&self, user_id: Uuid) -> Result<TokenPair, SessionError> {
        let access = self.signer.mint(TokenKind::Access, user_id)?;
        let refresh = self.refresh_tokens.issue(user_id).await?;
        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// The presented refresh token is consumed; every failure is
    /// `Unauthorized` and leaves the store unchanged.
    pub async fn refresh(&self, raw: &str) -> Result<TokenPair, SessionError> {
        let claims = self
            .signer
            .verify(TokenKind::Refresh, raw)
            .map_err(|e| {
                debug!(error = %e, "Refresh token rejected");
                SessionError::Unauthorized
            })?;
        let subject = claims.subject().ok_or(SessionError::Unauthorized)?;

        match self.users.get(subject).await {
            Ok(user) if user.is_verified() => {}
            Ok(_) | Err(DbError::NotFound(_)) => return Err(SessionError::Unauthorized),
            Err(e) => return Err(e.into()),
        }

        let (owner, refresh) = match self.refresh_tokens.rotate(raw).await {
            Ok(rotated) => rotated,
            Err(DbError::NotFound(_) | DbError::Expired(_)) => {
                debug!(user_id = %subject, "Refresh token has no live session");
                return Err(SessionError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };
        if owner != subject {
            return Err(SessionError::Unauthorized);
        }

        let access = self.signer.mint(TokenKind::Access, owner)?;
        debug!(user_id = %owner, "Session refreshed");
        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }

    /// End the session behind `raw`, if any. Absent or unknown tokens succeed.
    pub async fn logout(&self, raw: Option<&str>) -> Result<(), SessionError> {
        if let Some(raw) = raw {
            let removed = self.refresh_tokens.revoke(raw).await?;
            debug!(removed, "Logout");
        }
        Ok(())
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Email a password-reset link if the account exists.
    ///
    /// Returns `Ok(())` whether or not it does.
    pub async fn forgot_password(&self, identifier: &str) -> Result<(), SessionError> {
        let Some(user) = self.users.find_by_identifier(identifier).await? else {
            debug!("Password reset requested for unknown identifier");
            return Ok(());
        };

        let token = self
            .action_tokens
            .issue(user.id, ActionKind::PasswordReset)
            .await?;
        self.mailer
            .send(
                EmailKind::PasswordReset,
                &user.name,
                &user.email,
                &self.reset_url(&token),
            )
            .await
            .map_err(|e| {
                warn!(user_id = %user.id, error = %e, "Failed to send password reset email");
                SessionError::internal(e)
            })?;

        info!(user_id = %user.id, "Password reset email sent");
        Ok(())
    }

    /// Redeem a reset token: set the new password, consume the token and end
    /// every session of the user, all in one transaction.
    pub async fn reset_password(&self, raw: &str, new_password: &str) -> Result<(), SessionError> {
        // Reject dead links before paying for bcrypt
        self.action_tokens
            .peek(raw, ActionKind::PasswordReset)
            .await
            .map_err(SessionError::from_redemption)?;

        let password_hash = self.passwords.hash(new_password).await?;
        let now = self.clock.now();

        let (user_id, revoked) = self
            .action_tokens
            .redeem_with(raw, ActionKind::PasswordReset, move |txn, user_id| {
                if !users::exists_in(txn, user_id)? {
                    return Ok(None);
                }
                users::set_password_in(txn, user_id, password_hash, now)?;
                refresh_tokens::revoke_all_in(txn, user_id).map(Some)
            })
            .await
            .map_err(SessionError::from_redemption)?;

        let Some(revoked) = revoked else {
            return Err(SessionError::NotFound(format!("User {user_id}")));
        };

        info!(user_id = %user_id, revoked_sessions = revoked, "Password reset");
        Ok(())
    }

    // =========================================================================
    // Account
    // =========================================================================

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserProfile, SessionError> {
        Ok(self.users.get(user_id).await?.profile())
    }

    /// Delete the account and every session and action token it owns.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), SessionError> {
        self.users.delete(user_id).await?;
        info!(user_id = %user_id, "Account deleted");
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Delete expired refresh and action tokens.
    pub async fn prune_expired(&self) -> Result<PruneReport, SessionError> {
        let refresh_tokens = self.refresh_tokens.prune_expired().await?;
        let action_tokens = self.action_tokens.prune_expired().await?;
        Ok(PruneReport {
            refresh_tokens,
            action_tokens,
        })
    }

    /// Readiness check: the database answers a read.
    pub async fn ping(&self) -> Result<(), SessionError> {
        blocking(&self.db, |db| db.ping()).await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn refresh_store(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }
}
