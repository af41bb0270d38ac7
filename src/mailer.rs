// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound email (verification and password-reset links).
//!
//! The session engine only sees the [`Mailer`] trait. Production builds send
//! through [`ResendMailer`](crate::providers::resend::ResendMailer); builds
//! with the `dev` feature may use [`LogMailer`], which writes the link to
//! the log instead of delivering it.

use std::sync::Arc;

use async_trait::async_trait;

/// Which email to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

impl std::fmt::Display for EmailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailKind::Verification => write!(f, "verification"),
            EmailKind::PasswordReset => write!(f, "password_reset"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail configuration invalid: {0}")]
    Config(String),

    #[error("mail request failed: {0}")]
    Request(String),

    #[error("mail provider rejected message: {0}")]
    Rejected(String),
}

/// Email delivery collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `kind` to `email`, greeting `name` and linking to `url`.
    async fn send(&self, kind: EmailKind, name: &str, email: &str, url: &str)
        -> Result<(), MailError>;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// Rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the subject and HTML body for `kind`.
pub fn render(kind: EmailKind, project_name: &str, name: &str, url: &str) -> EmailContent {
    let project = escape_html(project_name);
    let name = escape_html(name);
    let url = escape_html(url);

    let (subject, heading, body, button) = match kind {
        EmailKind::Verification => (
            format!("Verify your email for {project_name}"),
            format!("Welcome to {project}, {name}!"),
            "We're excited to have you. Please click the button below to verify your \
             email address and activate your account.",
            "Verify Email",
        ),
        EmailKind::PasswordReset => (
            format!("Reset your {project_name} password"),
            format!("Welcome back to {project}, {name}!"),
            "Please click the button below to reset your password and regain access \
             to your account.",
            "Reset Password",
        ),
    };

    let html = format!(
        r#"<html><body style="background-color:#f6f9fc;font-family:sans-serif"><div style="margin:0 auto;padding:20px 0 48px;width:580px"><h1 style="font-size:24px;color:#484848">{heading}</h1><p style="font-size:16px;color:#484848">{body}</p><a href="{url}" style="background-color:#000;border-radius:4px;color:#fff;display:block;font-size:16px;padding:11px 23px;text-align:center;text-decoration:none">{button}</a><p style="font-size:16px;color:#484848">If you did not request this, you can safely ignore this email.</p><p style="font-size:12px;color:#8898aa">{url}</p></div></body></html>"#
    );

    EmailContent { subject, html }
}

/// Mailer that logs instead of sending. Only available with the `dev` feature.
#[cfg(feature = "dev")]
#[derive(Debug, Default)]
pub struct LogMailer;

#[cfg(feature = "dev")]
#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        kind: EmailKind,
        _name: &str,
        email: &str,
        url: &str,
    ) -> Result<(), MailError> {
        tracing::warn!(%kind, %email, %url, "DEV mailer: email not sent");
        Ok(())
    }
}
