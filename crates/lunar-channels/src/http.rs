// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

use crate::channel::{AttachmentKind, ChatType, Envelope};

/// `POST /api/chat` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<ChatAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatAttachment {
    pub kind: AttachmentKind,
    pub uri: Option<String>,
    pub mime: Option<String>,
}

/// `POST /api/chat` response body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

/// Builds the normalized envelope for one HTTP chat request. `peer_id` is
/// the caller-supplied `session_id`, or a freshly generated one when absent
/// (the gateway is responsible for generating and returning it).
pub fn envelope_for(peer_id: &str, req: &ChatRequest) -> Envelope {
    let mut envelope = Envelope::new("http", peer_id, req.message.clone(), ChatType::Direct);
    envelope.attachments = req
        .attachments
        .iter()
        .map(|a| crate::channel::Attachment { kind: a.kind, uri: a.uri.clone(), mime: a.mime.clone() })
        .collect();
    envelope
}
