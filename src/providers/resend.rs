// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resend email API integration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::config::MailSettings;
use crate::mailer::{render, EmailKind, MailError, Mailer};

const DEFAULT_API_BASE_URL: &str = "https://api.resend.com";

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Sends transactional email through `POST /emails`.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    api_base_url: String,
    api_key: String,
    from: String,
    project_name: String,
    http: Client,
}

impl ResendMailer {
    pub fn new(settings: &MailSettings, project_name: &str) -> Result<Self, MailError> {
        if settings.api_key.trim().is_empty() {
            return Err(MailError::Config("RESEND_API_KEY is empty".to_string()));
        }
        if !settings.from_address.contains('@') {
            return Err(MailError::Config(
                "RESEND_EMAIL_ADDRESS is not an email address".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| MailError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: settings
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_key: settings.api_key.clone(),
            from: format!("{project_name} <{}>", settings.from_address),
            project_name: project_name.to_string(),
            http,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(
        &self,
        kind: EmailKind,
        name: &str,
        email: &str,
        url: &str,
    ) -> Result<(), MailError> {
        let content = render(kind, &self.project_name, name, url);
        let payload = SendEmailRequest {
            from: &self.from,
            to: [email],
            subject: &content.subject,
            html: &content.html,
        };

        let response = self
            .http
            .post(format!("{}/emails", self.api_base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::Request(format!("POST /emails failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!(
                "POST /emails returned {status}: {body}"
            )));
        }

        info!(%kind, "Email handed to Resend");
        Ok(())
    }
}
