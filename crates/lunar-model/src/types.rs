// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// A single part of a multimodal user message. Most requests are plain text;
/// `Image` exists so channel attachments (Telegram photos, pasted images)
/// can be forwarded to the model without a separate encoding step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { image_url: String, detail: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolContentPart {
    Text { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Parts(Vec<ToolContentPart>),
}

impl ToolResultContent {
    pub fn as_text(&self) -> String {
        match self {
            ToolResultContent::Text(t) => t.clone(),
            ToolResultContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ToolContentPart::Text { text } => text.as_str(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Splits a `data:<mime>;base64,<payload>` URL into its mime type and payload.
pub fn parse_data_url_parts(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    Some((mime, payload))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallRepr {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    ContentParts(Vec<ContentPart>),
    ToolCall {
        tool_call_id: String,
        function: FunctionCallRepr,
    },
    ToolResult {
        tool_call_id: String,
        content: ToolResultContent,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        Self { role: Role::User, content: MessageContent::ContentParts(parts) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }

    pub fn tool_call(tool_call_id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolCall {
                tool_call_id: tool_call_id.into(),
                function: FunctionCallRepr { name: name.into(), arguments: arguments.into() },
            },
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_call_id: tool_call_id.into(),
                content: ToolResultContent::Text(text.into()),
            },
        }
    }

    pub fn tool_result_with_parts(tool_call_id: impl Into<String>, parts: Vec<ToolContentPart>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_call_id: tool_call_id.into(),
                content: ToolResultContent::Parts(parts),
            },
        }
    }

    pub fn as_text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::ContentParts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            MessageContent::ToolCall { function, .. } => format!("{}({})", function.name, function.arguments),
            MessageContent::ToolResult { content, .. } => content.as_text(),
        }
    }

    pub fn image_urls(&self) -> Vec<&str> {
        match &self.content {
            MessageContent::ContentParts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Image { image_url, .. } => Some(image_url.as_str()),
                    ContentPart::Text { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Rough token estimate: 4 characters per token for text, fixed costs for images.
    pub fn approx_tokens(&self) -> u32 {
        match &self.content {
            MessageContent::Text(t) => (t.len() as u32 / 4).max(1),
            MessageContent::ContentParts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => (text.len() as u32 / 4).max(1),
                    ContentPart::Image { detail, .. } => match detail.as_deref() {
                        Some("low") => 85,
                        _ => 765,
                    },
                })
                .sum(),
            MessageContent::ToolCall { function, .. } => (function.arguments.len() as u32 / 4).max(1),
            MessageContent::ToolResult { content, .. } => (content.as_text().len() as u32 / 4).max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    #[serde(default)]
    pub stream: bool,
    /// Appended to the system prompt at call time (e.g. retrieved memory
    /// context); kept separate from `messages` so providers can place it
    /// wherever their wire format expects a dynamic system suffix.
    #[serde(default)]
    pub system_dynamic_suffix: Option<String>,
}

/// One event in a streamed completion. `ToolCall` deltas carry `index` so a
/// provider's response can interleave text and multiple concurrent tool
/// calls and still be reassembled correctly on the receiving end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEvent {
    TextDelta { text: String },
    ThinkingDelta { text: String },
    ToolCall { index: u32, id: Option<String>, name: Option<String>, arguments: String },
    Usage { usage: Usage },
    /// Emitted when the provider reports `finish_reason == "length"`.
    MaxTokens,
    Done,
    Error { message: String },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_read_tokens: u32,
    pub cache_write_tokens: u32,
}
