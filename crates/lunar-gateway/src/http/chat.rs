// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use lunar_channels::http::{envelope_for, ChatRequest, ChatResponse};

use super::AppState;

/// `POST /api/chat`. Generates a `session_id` when the caller omits one.
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let peer_id = req.session_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let envelope = envelope_for(&peer_id, &req);

    let response = state.agent.handle_message(&envelope).await.map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    Ok(Json(ChatResponse { response, session_id: peer_id }))
}
