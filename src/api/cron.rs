// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{auth::CronAuth, error::ApiError, models::PruneResponse, state::AppState};

/// Delete expired refresh and action tokens.
///
/// Intended for an external scheduler holding `CRON_SECRET`.
#[utoipa::path(
    get,
    path = "/api/cron/prune-tokens",
    tag = "Cron",
    responses(
        (status = 200, body = PruneResponse),
        (status = 401, description = "Missing or wrong cron secret")
    )
)]
pub async fn prune_tokens(
    _auth: CronAuth,
    State(state): State<AppState>,
) -> Result<Json<PruneResponse>, ApiError> {
    let report = state.engine.prune_expired().await?;
    Ok(Json(PruneResponse {
        success: true,
        pruned_count: report.refresh_tokens,
        pruned_action_tokens: report.action_tokens,
    }))
}
