// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! WebSocket bridge for `/ws/chat`: translates `ClientFrame`/`ServerFrame`
//! JSON frames into calls against the shared [`Agent`](lunar_core::Agent).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tracing::debug;

use lunar_channels::websocket::{envelope_for, ClientFrame, ServerFrame};

use super::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let peer_id = uuid::Uuid::new_v4().to_string();

    loop {
        let Some(msg) = socket.recv().await else { break };
        let msg = match msg {
            Ok(m) => m,
            Err(err) => {
                debug!("WebSocket recv error: {err}");
                break;
            }
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::Ping) => {
                    if send(&mut socket, &ServerFrame::Pong).await.is_err() {
                        break;
                    }
                }
                Ok(ClientFrame::Message { text }) => {
                    if send(&mut socket, &ServerFrame::Typing).await.is_err() {
                        break;
                    }
                    let envelope = envelope_for(&peer_id, &text);
                    let frame = match state.agent.handle_message(&envelope).await {
                        Ok(content) => ServerFrame::Message { content },
                        Err(err) => ServerFrame::Error { content: err.to_string() },
                    };
                    if send(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = send(&mut socket, &ServerFrame::Error { content: format!("invalid frame: {err}") }).await;
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    debug!("WebSocket connection closed");
}

async fn send(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).expect("ServerFrame always serializes");
    socket.send(Message::Text(json)).await
}
