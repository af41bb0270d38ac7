// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::AppConfig;
use crate::session::SessionEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SessionEngine>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(engine: Arc<SessionEngine>, config: AppConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}
