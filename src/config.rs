// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the validated [`AppConfig`]
//! loaded once at startup. The config is immutable afterwards and shared
//! through `Arc`.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `auth.redb` | `./data` |
//! | `APP_URL` | Public base URL for email links and redirects | Required |
//! | `PROJECT_NAME` | Product name shown in emails | `Codex` |
//! | `JWT_ACCESS_SECRET` | HS256 key for access tokens (≥ 32 chars) | Required |
//! | `JWT_REFRESH_SECRET` | HS256 key for refresh tokens (≥ 32 chars, distinct) | Required |
//! | `JWT_ISSUER` | `iss` claim | `auth-session-server` |
//! | `JWT_AUDIENCE` | `aud` claim | `auth-session-server` |
//! | `BCRYPT_ROUNDS` | bcrypt cost factor (4–31) | `10` |
//! | `CRON_SECRET` | Bearer secret for the prune endpoint (≥ 16 chars) | Required |
//! | `RESEND_API_KEY` | Resend API key | Required (optional with `dev`) |
//! | `RESEND_EMAIL_ADDRESS` | Sender address | Required (optional with `dev`) |
//! | `RESEND_API_BASE_URL` | Resend API override | `https://api.resend.com` |
//! | `COOKIE_SECURE` | `Secure` attribute on session cookies | `true` |
//! | `PRUNE_INTERVAL_SECS` | In-process expiry sweep interval, `0` disables | `3600` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::tokens::TokenSettings;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory holding the credential database.
///
/// # Default
/// `./data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "auth.redb";

pub const APP_URL_ENV: &str = "APP_URL";
pub const PROJECT_NAME_ENV: &str = "PROJECT_NAME";
pub const JWT_ACCESS_SECRET_ENV: &str = "JWT_ACCESS_SECRET";
pub const JWT_REFRESH_SECRET_ENV: &str = "JWT_REFRESH_SECRET";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const JWT_AUDIENCE_ENV: &str = "JWT_AUDIENCE";
pub const BCRYPT_ROUNDS_ENV: &str = "BCRYPT_ROUNDS";
pub const CRON_SECRET_ENV: &str = "CRON_SECRET";
pub const RESEND_API_KEY_ENV: &str = "RESEND_API_KEY";
pub const RESEND_EMAIL_ADDRESS_ENV: &str = "RESEND_EMAIL_ADDRESS";
pub const RESEND_API_BASE_URL_ENV: &str = "RESEND_API_BASE_URL";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
pub const PRUNE_INTERVAL_SECS_ENV: &str = "PRUNE_INTERVAL_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// Logging format: `json` for structured logs, anything else for pretty.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_PROJECT_NAME: &str = "Codex";
pub const DEFAULT_SERVICE_ID: &str = "auth-session-server";
pub const DEFAULT_BCRYPT_ROUNDS: u32 = 10;
pub const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const MIN_JWT_SECRET_LEN: usize = 32;
const MIN_CRON_SECRET_LEN: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Outbound email provider credentials.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub api_key: String,
    pub from_address: String,
    pub api_base_url: Option<String>,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Public base URL without a trailing slash
    pub app_url: String,
    pub project_name: String,
    pub tokens: TokenSettings,
    pub bcrypt_cost: u32,
    pub cron_secret: String,
    /// `None` only in `dev` builds without Resend credentials
    pub mail: Option<MailSettings>,
    pub cookie_secure: bool,
    /// `None` disables the in-process sweep
    pub prune_interval: Option<Duration>,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.or_default(HOST_ENV, DEFAULT_HOST);
        let port = env.parsed(PORT_ENV, DEFAULT_PORT)?;
        let data_dir = PathBuf::from(env.or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR));

        let app_url = env.required(APP_URL_ENV)?;
        let parsed = url::Url::parse(&app_url).map_err(|e| ConfigError::Invalid {
            var: APP_URL_ENV,
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                var: APP_URL_ENV,
                reason: "must be an http(s) URL".to_string(),
            });
        }
        let app_url = app_url.trim_end_matches('/').to_string();

        let project_name = env.or_default(PROJECT_NAME_ENV, DEFAULT_PROJECT_NAME);

        let access_secret = env.secret(JWT_ACCESS_SECRET_ENV, MIN_JWT_SECRET_LEN)?;
        let refresh_secret = env.secret(JWT_REFRESH_SECRET_ENV, MIN_JWT_SECRET_LEN)?;
        if access_secret == refresh_secret {
            return Err(ConfigError::Invalid {
                var: JWT_REFRESH_SECRET_ENV,
                reason: format!("must differ from {JWT_ACCESS_SECRET_ENV}"),
            });
        }
        let tokens = TokenSettings {
            access_secret,
            refresh_secret,
            issuer: env.or_default(JWT_ISSUER_ENV, DEFAULT_SERVICE_ID),
            audience: env.or_default(JWT_AUDIENCE_ENV, DEFAULT_SERVICE_ID),
        };

        let bcrypt_cost = env.parsed(BCRYPT_ROUNDS_ENV, DEFAULT_BCRYPT_ROUNDS)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: BCRYPT_ROUNDS_ENV,
                reason: "must be between 4 and 31".to_string(),
            });
        }

        let cron_secret = env.secret(CRON_SECRET_ENV, MIN_CRON_SECRET_LEN)?;

        let mail = match (
            env.optional(RESEND_API_KEY_ENV),
            env.optional(RESEND_EMAIL_ADDRESS_ENV),
        ) {
            (Some(api_key), Some(from_address)) => Some(MailSettings {
                api_key,
                from_address,
                api_base_url: env.optional(RESEND_API_BASE_URL_ENV),
            }),
            _ if cfg!(feature = "dev") => None,
            (None, _) => return Err(ConfigError::Missing(RESEND_API_KEY_ENV)),
            (Some(_), None) => return Err(ConfigError::Missing(RESEND_EMAIL_ADDRESS_ENV)),
        };

        let cookie_secure = env.flag(COOKIE_SECURE_ENV, true)?;

        let prune_secs = env.parsed(PRUNE_INTERVAL_SECS_ENV, DEFAULT_PRUNE_INTERVAL_SECS)?;
        let prune_interval = (prune_secs > 0).then(|| Duration::from_secs(prune_secs));

        let tls = match (env.optional(TLS_CERT_PATH_ENV), env.optional(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            host,
            port,
            data_dir,
            app_url,
            project_name,
            tokens,
            bcrypt_cost,
            cron_secret,
            mail,
            cookie_secure,
            prune_interval,
            tls,
        })
    }

    /// Full path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// `host:port` bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty trimmed value, if set.
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(name).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(v) => Err(ConfigError::Invalid {
                var: name,
                reason: format!("expected a boolean, got {v:?}"),
            }),
        }
    }

    fn secret(&self, name: &'static str, min_len: usize) -> Result<String, ConfigError> {
        let value = self.required(name)?;
        if value.chars().count() < min_len {
            return Err(ConfigError::Invalid {
                var: name,
                reason: format!("must be at least {min_len} characters"),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (APP_URL_ENV, "https://app.example.com/".to_string()),
            (JWT_ACCESS_SECRET_ENV, "a".repeat(32)),
            (JWT_REFRESH_SECRET_ENV, "r".repeat(32)),
            (CRON_SECRET_ENV, "c".repeat(16)),
            (RESEND_API_KEY_ENV, "re_key".to_string()),
            (RESEND_EMAIL_ADDRESS_ENV, "noreply@example.com".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults_applied() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.app_url, "https://app.example.com");
        assert_eq!(config.project_name, "Codex");
        assert_eq!(config.tokens.issuer, "auth-session-server");
        assert_eq!(config.tokens.audience, "auth-session-server");
        assert_eq!(config.bcrypt_cost, 10);
        assert!(config.cookie_secure);
        assert_eq!(config.prune_interval, Some(Duration::from_secs(3600)));
        assert_eq!(config.tls, None);
        assert_eq!(config.database_path(), PathBuf::from("./data/auth.redb"));
    }

    #[test]
    fn missing_app_url() {
        let mut env = base_env();
        env.remove(APP_URL_ENV);
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing(APP_URL_ENV));
    }

    #[test]
    fn short_jwt_secret_rejected() {
        let mut env = base_env();
        env.insert(JWT_ACCESS_SECRET_ENV, "short".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid {
                var: JWT_ACCESS_SECRET_ENV,
                ..
            })
        ));
    }

    #[test]
    fn identical_jwt_secrets_rejected() {
        let mut env = base_env();
        env.insert(JWT_REFRESH_SECRET_ENV, "a".repeat(32));
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid {
                var: JWT_REFRESH_SECRET_ENV,
                ..
            })
        ));
    }

    #[test]
    fn bcrypt_cost_bounds() {
        let mut env = base_env();
        env.insert(BCRYPT_ROUNDS_ENV, "3".to_string());
        assert!(load(&env).is_err());
        env.insert(BCRYPT_ROUNDS_ENV, "12".to_string());
        assert_eq!(load(&env).unwrap().bcrypt_cost, 12);
        env.insert(BCRYPT_ROUNDS_ENV, "ten".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn prune_interval_zero_disables() {
        let mut env = base_env();
        env.insert(PRUNE_INTERVAL_SECS_ENV, "0".to_string());
        assert_eq!(load(&env).unwrap().prune_interval, None);
    }

    #[test]
    fn cookie_secure_flag() {
        let mut env = base_env();
        env.insert(COOKIE_SECURE_ENV, "false".to_string());
        assert!(!load(&env).unwrap().cookie_secure);
        env.insert(COOKIE_SECURE_ENV, "maybe".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn tls_requires_both_paths() {
        let mut env = base_env();
        env.insert(TLS_CERT_PATH_ENV, "/certs/cert.pem".to_string());
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing(TLS_KEY_PATH_ENV));
        env.insert(TLS_KEY_PATH_ENV, "/certs/key.pem".to_string());
        assert!(load(&env).unwrap().tls.is_some());
    }

    #[test]
    fn non_http_app_url_rejected() {
        let mut env = base_env();
        env.insert(APP_URL_ENV, "ftp://example.com".to_string());
        assert!(load(&env).is_err());
    }

    #[cfg(not(feature = "dev"))]
    #[test]
    fn mail_credentials_required() {
        let mut env = base_env();
        env.remove(RESEND_API_KEY_ENV);
        assert_eq!(
            load(&env).unwrap_err(),
            ConfigError::Missing(RESEND_API_KEY_ENV)
        );
    }
}
