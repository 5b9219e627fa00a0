// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Direct,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Audio,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub uri: Option<String>,
    pub mime: Option<String>,
}

/// The normalized, immutable record every channel produces before the core
/// ever sees a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub provider: String,
    pub peer_id: String,
    pub text: String,
    pub chat_type: ChatType,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Envelope {
    pub fn new(provider: impl Into<String>, peer_id: impl Into<String>, text: impl Into<String>, chat_type: ChatType) -> Self {
        Self { provider: provider.into(), peer_id: peer_id.into(), text: text.into(), chat_type, ts: Utc::now(), attachments: Vec::new() }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The shared handler every connector feeds envelopes into; returns the
/// agent loop's reply text for that message.
pub type InboundHandler = Arc<dyn Fn(Envelope) -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync>;

/// A long-lived channel connector.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the connector until `stop` is called or the transport ends.
    /// Each inbound message is normalized to an [`Envelope`] and passed to
    /// `on_message`; the returned text is delivered back to the peer.
    async fn start(&self, on_message: InboundHandler) -> anyhow::Result<()>;

    async fn stop(&self) -> anyhow::Result<()>;
}

/// Splits `text` into chunks no longer than `max_len`, preferring to break
/// at a paragraph boundary, then a line boundary, then a word boundary.
pub fn split_reply(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            let trimmed = remaining.trim_end();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
            break;
        }
        let window = &remaining[..max_len];
        let split_at = window
            .rfind("\n\n")
            .map(|i| i + 2)
            .or_else(|| window.rfind('\n').map(|i| i + 1))
            .or_else(|| window.rfind(' ').map(|i| i + 1))
            .unwrap_or(max_len);
        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk.trim_end().to_string());
        remaining = rest;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_reply("hello", 100);
        assert_eq!(chunks, vec!["hello"]);
    }

    #[test]
    fn splits_at_paragraph_boundary_when_possible() {
        let text = format!("{}\n\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = split_reply(&text, 15);
        assert_eq!(chunks[0], "a".repeat(10));
    }

    #[test]
    fn splits_at_word_boundary_without_paragraphs() {
        let text = "word ".repeat(20);
        let chunks = split_reply(&text, 12);
        for chunk in &chunks {
            assert!(chunk.len() <= 12);
        }
        assert!(chunks.iter().all(|c| !c.ends_with(' ') || c.is_empty()));
    }

    #[test]
    fn every_chunk_respects_the_cap_even_with_no_boundaries() {
        let text = "a".repeat(50);
        let chunks = split_reply(&text, 10);
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn envelope_new_defaults_to_empty_attachments() {
        let e = Envelope::new("cli", "local", "hi", ChatType::Direct);
        assert!(e.attachments.is_empty());
    }
}
