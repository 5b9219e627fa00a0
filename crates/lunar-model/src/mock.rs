// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::{CompletionRequest, Message, ModelProvider, ResponseEvent, ResponseStream};

/// Deterministic provider that echoes the last user message back, prefixed
/// with "MOCK: ". Used as the default provider in tests and as a safe
/// fallback when no API key is configured.
pub struct MockProvider {
    model: String,
}

impl MockProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("mock-echo")
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let last_user = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::Role::User))
            .map(|m| m.as_text())
            .unwrap_or_default();

        let events = vec![
            Ok(ResponseEvent::TextDelta { text: format!("MOCK: {last_user}") }),
            Ok(ResponseEvent::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// A queue of pre-scripted event sequences, popped one sequence per
/// `complete()` call. Lets tests script multi-turn tool-call/response
/// exchanges without a live model.
pub struct ScriptedMockProvider {
    model: String,
    scripts: Mutex<Vec<Vec<ResponseEvent>>>,
    last_request: Arc<Mutex<Option<CompletionRequest>>>,
}

impl ScriptedMockProvider {
    pub fn new(model: impl Into<String>, scripts: Vec<Vec<ResponseEvent>>) -> Self {
        Self {
            model: model.into(),
            scripts: Mutex::new(scripts),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Convenience constructor: always returns the same plain text response.
    pub fn always_text(model: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(model, vec![vec![ResponseEvent::TextDelta { text }, ResponseEvent::Done]])
    }

    /// Convenience constructor: first call emits a tool call, second call
    /// emits a plain text response (the typical one-tool-round agent turn).
    pub fn tool_then_text(
        model: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(
            model,
            vec![
                vec![
                    ResponseEvent::ToolCall {
                        index: 0,
                        id: Some("call_0".into()),
                        name: Some(tool_name.into()),
                        arguments: arguments.into(),
                    },
                    ResponseEvent::Done,
                ],
                vec![ResponseEvent::TextDelta { text: final_text.into() }, ResponseEvent::Done],
            ],
        )
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        *self.last_request.lock().unwrap() = Some(req);
        let mut scripts = self.scripts.lock().unwrap();
        let events = if scripts.is_empty() {
            vec![ResponseEvent::TextDelta { text: String::new() }, ResponseEvent::Done]
        } else {
            scripts.remove(0)
        };
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
