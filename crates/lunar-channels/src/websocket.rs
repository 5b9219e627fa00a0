// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

use crate::channel::{ChatType, Envelope};

/// Frame a browser client sends over `/ws/chat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Message { text: String },
    Ping,
}

/// Frame the gateway sends back over `/ws/chat`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Typing,
    Message { content: String },
    Token { content: String },
    Error { content: String },
    Pong,
}

/// Builds the normalized envelope for one WebSocket connection's message.
/// The transport itself (accept/upgrade, the read/write loop) is owned by
/// the gateway's axum route, since socket lifecycle is tied to the HTTP
/// server, not to an independent long-lived connector.
pub fn envelope_for(peer_id: &str, text: &str) -> Envelope {
    Envelope::new("websocket", peer_id, text, ChatType::Direct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_frame_deserializes() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"message","text":"hi"}"#).unwrap();
        matches!(frame, ClientFrame::Message { .. });
    }

    #[test]
    fn client_ping_frame_deserializes() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        matches!(frame, ClientFrame::Ping);
    }

    #[test]
    fn server_message_frame_serializes_with_tag() {
        let json = serde_json::to_string(&ServerFrame::Message { content: "hi".into() }).unwrap();
        assert!(json.contains("\"type\":\"message\""));
    }

    #[test]
    fn envelope_for_uses_websocket_provider() {
        let e = envelope_for("conn-1", "hello");
        assert_eq!(e.provider, "websocket");
        assert_eq!(e.peer_id, "conn-1");
    }
}
