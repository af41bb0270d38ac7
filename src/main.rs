// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use auth_session_server::{
    api::router,
    auth::TokenSigner,
    clock::{SharedClock, SystemClock},
    config::{AppConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    mailer::SharedMailer,
    providers::resend::ResendMailer,
    prune::PruneTask,
    session::{PasswordHasher, SessionEngine},
    state::AppState,
    storage::AuthDatabase,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Time allowed for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

fn build_mailer(config: &AppConfig) -> SharedMailer {
    match &config.mail {
        Some(settings) => Arc::new(
            ResendMailer::new(settings, &config.project_name)
                .expect("Failed to build email client"),
        ),
        #[cfg(feature = "dev")]
        None => {
            tracing::warn!("DEV MODE: no email provider configured, links are only logged");
            Arc::new(auth_session_server::mailer::LogMailer)
        }
        #[cfg(not(feature = "dev"))]
        None => panic!("Email provider credentials are required"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = AppConfig::from_env().expect("Invalid configuration");

    let db = Arc::new(
        AuthDatabase::open(&config.database_path()).expect("Failed to open credential database"),
    );
    let clock: SharedClock = Arc::new(SystemClock);
    let signer = Arc::new(TokenSigner::new(&config.tokens, Arc::clone(&clock)));
    let passwords = PasswordHasher::new(config.bcrypt_cost).expect("Failed to initialise bcrypt");
    let mailer = build_mailer(&config);

    let engine = Arc::new(SessionEngine::new(
        db,
        signer,
        passwords,
        mailer,
        clock,
        &config.app_url,
    ));

    let shutdown = CancellationToken::new();
    if let Some(interval) = config.prune_interval {
        tokio::spawn(PruneTask::new(Arc::clone(&engine), interval).run(shutdown.clone()));
    }

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .expect("Failed to parse bind address");
    let tls = config.tls.clone();
    let app = router(AppState::new(engine, config));

    let handle = Handle::new();
    {
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });
    }

    match tls {
        Some(paths) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");

            let tls_config = RustlsConfig::from_pem_file(&paths.cert, &paths.key)
                .await
                .expect("Failed to load TLS certificate");

            info!(%addr, "Auth session server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            info!(%addr, "Auth session server listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTP server failed");
        }
    }

    info!("Server stopped");
}
