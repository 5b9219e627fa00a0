// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use axum::extract::State;
use axum::Json;
use lunar_metrics::{HealthSnapshot, MetricsSnapshot};

use super::AppState;

/// `GET /api/metrics`.
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// `GET /api/metrics/health`.
pub async fn metrics_health(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.metrics.health())
}
