// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP/WebSocket ingress: builds the Axum router exposing the five
//! endpoints described in the gateway's external interface.

mod chat;
mod health;
mod metrics;
pub mod security;
mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use lunar_core::Agent;
use lunar_metrics::MetricsRegistry;

/// Shared state every HTTP/WebSocket handler reads from.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub metrics: Arc<MetricsRegistry>,
}

/// Builds the full Axum app: routes plus the security-header and CSRF
/// middleware applied to every request.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/chat", post(chat::chat))
        .route("/ws/chat", get(ws::ws_handler))
        .route("/api/metrics", get(metrics::metrics))
        .route("/api/metrics/health", get(metrics::metrics_health))
        .layer(axum::middleware::from_fn(security::csrf_guard))
        .layer(axum::middleware::from_fn(security::security_headers))
        .with_state(state)
}
