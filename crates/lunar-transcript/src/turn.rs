// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a session transcript.
///
/// Turns are never rewritten once appended; a `ToolResult` always references
/// an earlier `ToolCall.id` within the same session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    User { content: String, ts: DateTime<Utc> },
    Assistant { content: String, ts: DateTime<Utc>, #[serde(default, skip_serializing_if = "Vec::is_empty")] tool_calls: Vec<ToolCallRef> },
    ToolCall { id: String, name: String, arguments: String, ts: DateTime<Utc> },
    ToolResult { id: String, name: String, content: String, ok: bool, ts: DateTime<Utc> },
    /// Bootstrapping only; never counted toward `loadRecent`'s N non-system turns.
    System { content: String, ts: DateTime<Utc> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRef {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl Turn {
    pub fn ts(&self) -> DateTime<Utc> {
        match self {
            Turn::User { ts, .. }
            | Turn::Assistant { ts, .. }
            | Turn::ToolCall { ts, .. }
            | Turn::ToolResult { ts, .. }
            | Turn::System { ts, .. } => *ts,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Turn::System { .. })
    }
}

/// One flattened `{role, content}` pair fed to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Summary row returned by `listSessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub turn_count: usize,
    pub last_ts: Option<DateTime<Utc>>,
}

/// Flattens turns into role-tagged messages in source order, the shape the
/// model provider expects. `tool_call`/`tool_result` turns become
/// `assistant`/`tool` messages respectively.
pub fn to_messages(turns: &[Turn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|t| match t {
            Turn::User { content, .. } => ChatMessage { role: "user".into(), content: content.clone() },
            Turn::Assistant { content, .. } => ChatMessage { role: "assistant".into(), content: content.clone() },
            Turn::ToolCall { name, arguments, .. } => {
                ChatMessage { role: "assistant".into(), content: format!("{name}({arguments})") }
            }
            Turn::ToolResult { content, .. } => ChatMessage { role: "tool".into(), content: content.clone() },
            Turn::System { content, .. } => ChatMessage { role: "system".into(), content: content.clone() },
        })
        .collect()
}
