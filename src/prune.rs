// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expired Token Sweep
//!
//! Background task that periodically deletes expired refresh tokens and
//! expired single-use action tokens. `GET /api/cron/prune-tokens` runs the
//! same sweep on demand for external schedulers.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`; `main` cancels it before
//! draining the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::{PruneReport, SessionEngine};

/// Periodic sweep over the credential database.
pub struct PruneTask {
    engine: Arc<SessionEngine>,
    interval: Duration,
}

impl PruneTask {
    pub fn new(engine: Arc<SessionEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(task.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Token sweep starting");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Token sweep shutting down");
                    return;
                }
            }

            self.sweep().await;
        }
    }

    /// One pass. Failures are logged and retried on the next tick.
    async fn sweep(&self) -> Option<PruneReport> {
        match self.engine.prune_expired().await {
            Ok(report) => {
                if report.refresh_tokens + report.action_tokens > 0 {
                    info!(
                        refresh_tokens = report.refresh_tokens,
                        action_tokens = report.action_tokens,
                        "Token sweep removed expired tokens"
                    );
                } else {
                    debug!("Token sweep found nothing to remove");
                }
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Token sweep failed");
                None
            }
        }
    }
}
