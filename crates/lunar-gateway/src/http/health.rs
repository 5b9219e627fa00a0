// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    agent: String,
    model: String,
    uptime: i64,
}

/// `GET /api/health`.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agent: state.agent.agent_id().to_string(),
        model: state.agent.model_name().to_string(),
        uptime: state.metrics.uptime_secs(),
    })
}
