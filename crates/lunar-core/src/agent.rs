// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The bounded LLM/tool agent loop: one call into [`Agent::handle_message`]
//! turns a normalized [`Envelope`] into a reply, persisting every turn to
//! the transcript store and running input/output safety around the model.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use lunar_channels::Envelope;
use lunar_config::Config;
use lunar_metrics::MetricsRegistry;
use lunar_model::{CompletionRequest, Message, ModelProvider, ResponseEvent};
use lunar_safety::{input_pipeline, output_pipeline, GuardPipeline, SAFE_FALLBACK};
use lunar_tools::{ToolCall, ToolOutput, ToolRouter};
use lunar_transcript::{Turn, ToolCallRef, TranscriptStore};

use crate::events::AgentEvent;

/// How many recent non-system turns are replayed into the model's context
/// window on each new message.
const HISTORY_WINDOW: usize = 20;

pub struct Agent {
    model: Box<dyn ModelProvider>,
    router: ToolRouter,
    transcript: Arc<TranscriptStore>,
    input_guards: GuardPipeline,
    output_guards: GuardPipeline,
    agent_id: String,
    max_iterations: u32,
    system_prompt: String,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Agent {
    pub fn new(model: Box<dyn ModelProvider>, router: ToolRouter, transcript: Arc<TranscriptStore>, cfg: &Config) -> Self {
        let system_prompt = crate::prompts::system_prompt(cfg.agent.system_prompt.as_deref());
        Self {
            model,
            router,
            transcript,
            input_guards: input_pipeline(&cfg.safety),
            output_guards: output_pipeline(&cfg.safety, &system_prompt),
            agent_id: cfg.agent.agent_id.clone(),
            max_iterations: cfg.agent.max_iterations.max(1),
            system_prompt,
            events: None,
            metrics: None,
        }
    }

    /// Forwards streaming text deltas and tool lifecycle events to `tx` for
    /// the duration of every subsequent `handle_message` call.
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Instruments every LLM call, tool call, and guard check against
    /// `registry` for the duration of every subsequent `handle_message` call.
    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(registry);
        self
    }

    pub fn session_id(&self, envelope: &Envelope) -> String {
        self.transcript.resolve(&envelope.provider, &envelope.peer_id, &self.agent_id)
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Runs the full input-safety -> bounded agent loop -> output-safety
    /// pipeline for one inbound message and returns the reply text.
    pub async fn handle_message(&self, envelope: &Envelope) -> anyhow::Result<String> {
        let session_id = self.session_id(envelope);

        let input_result = self.input_guards.run(&envelope.text);
        if input_result.blocked {
            let reason = input_result.block_reason.unwrap_or_default();
            tracing::warn!(session_id = %session_id, reason = %reason, "input safety blocked message");
            self.emit(AgentEvent::Error(format!("input blocked: {reason}")));
            return Ok(SAFE_FALLBACK.to_string());
        }

        self.transcript.append_turn(&session_id, &Turn::User { content: envelope.text.clone(), ts: Utc::now() }).await?;

        let history = self.transcript.load_recent(&session_id, HISTORY_WINDOW).await?;
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(history.iter().filter_map(history_turn_to_message));

        let tool_schemas: Vec<lunar_model::ToolSchema> = self
            .router
            .schemas()
            .into_iter()
            .map(|s| lunar_model::ToolSchema { name: s.name, description: s.description, parameters: s.parameters })
            .collect();

        let mut iterations: u32 = 0;
        loop {
            iterations += 1;
            let req = CompletionRequest {
                messages: messages.clone(),
                tools: tool_schemas.clone(),
                stream: true,
                system_dynamic_suffix: None,
            };
            let (text, tool_calls) = self.run_completion(req).await?;

            if tool_calls.is_empty() {
                return self.finish_turn(&session_id, text).await;
            }

            if iterations >= self.max_iterations {
                let final_text = "Max iterations reached".to_string();
                self.transcript
                    .append_turn(&session_id, &Turn::Assistant { content: final_text.clone(), ts: Utc::now(), tool_calls: vec![] })
                    .await?;
                self.emit(AgentEvent::TurnComplete(final_text.clone()));
                return Ok(final_text);
            }

            let tool_call_refs: Vec<ToolCallRef> =
                tool_calls.iter().map(|c| ToolCallRef { id: c.id.clone(), name: c.name.clone(), arguments: c.args.to_string() }).collect();
            self.transcript
                .append_turn(&session_id, &Turn::Assistant { content: text.clone(), ts: Utc::now(), tool_calls: tool_call_refs })
                .await?;
            if !text.is_empty() {
                messages.push(Message::assistant(text));
            }
            for call in &tool_calls {
                self.transcript
                    .append_turn(&session_id, &Turn::ToolCall { id: call.id.clone(), name: call.name.clone(), arguments: call.args.to_string(), ts: Utc::now() })
                    .await?;
                messages.push(Message::tool_call(call.id.clone(), call.name.clone(), call.args.to_string()));
            }

            let results = self.dispatch_tool_calls(&session_id, tool_calls).await;
            for (call, output) in results {
                self.transcript
                    .append_turn(
                        &session_id,
                        &Turn::ToolResult {
                            id: output.call_id.clone(),
                            name: call.name.clone(),
                            content: output.content.clone(),
                            ok: !output.is_error,
                            ts: Utc::now(),
                        },
                    )
                    .await?;
                self.emit(AgentEvent::ToolCallFinished { id: output.call_id.clone(), name: call.name.clone(), is_error: output.is_error });
                messages.push(Message::tool_result(output.call_id.clone(), output.content.clone()));
            }
        }
    }

    async fn finish_turn(&self, session_id: &str, proposed: String) -> anyhow::Result<String> {
        let outcome = self.output_guards.run(&proposed);
        let final_text = if outcome.blocked {
            self.emit(AgentEvent::ReplySuperseded);
            SAFE_FALLBACK.to_string()
        } else {
            proposed
        };
        self.transcript.append_turn(session_id, &Turn::Assistant { content: final_text.clone(), ts: Utc::now(), tool_calls: vec![] }).await?;
        self.emit(AgentEvent::TurnComplete(final_text.clone()));
        Ok(final_text)
    }

    /// Drains one model response into its accumulated text and fully
    /// assembled tool calls. The model may stream a `ToolCall` event's
    /// `arguments` across several deltas keyed by `index`; only `id`/`name`
    /// are optional after the first delta for a given index.
    async fn run_completion(&self, req: CompletionRequest) -> anyhow::Result<(String, Vec<ToolCall>)> {
        let started = std::time::Instant::now();
        if let Some(metrics) = &self.metrics {
            metrics.incr_counter("llm_calls_total");
        }
        let result = self.run_completion_inner(req).await;
        if let Some(metrics) = &self.metrics {
            metrics.observe("llm_call_duration_ms", started.elapsed().as_secs_f64() * 1000.0);
            if result.is_err() {
                metrics.incr_counter("llm_errors_total");
            }
        }
        result
    }

    async fn run_completion_inner(&self, req: CompletionRequest) -> anyhow::Result<(String, Vec<ToolCall>)> {
        let mut stream = self.model.complete(req).await?;
        let mut text = String::new();
        let mut pending: BTreeMap<u32, PendingCall> = BTreeMap::new();

        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::TextDelta { text: delta } => {
                    self.emit(AgentEvent::TextDelta(delta.clone()));
                    text.push_str(&delta);
                }
                ResponseEvent::ThinkingDelta { .. } => {}
                ResponseEvent::ToolCall { index, id, name, arguments } => {
                    let entry = pending.entry(index).or_default();
                    if let Some(id) = id {
                        entry.id = Some(id);
                    }
                    if let Some(name) = name {
                        entry.name = Some(name);
                    }
                    entry.arguments.push_str(&arguments);
                }
                ResponseEvent::Usage { .. } => {}
                ResponseEvent::MaxTokens => {}
                ResponseEvent::Done => break,
                ResponseEvent::Error { message } => anyhow::bail!("model error: {message}"),
            }
        }

        let mut calls = Vec::new();
        for (index, pending_call) in pending {
            let Some(name) = pending_call.name else { continue };
            let id = pending_call.id.unwrap_or_else(|| format!("call_{index}"));
            let args: Value = serde_json::from_str(&pending_call.arguments).unwrap_or_else(|_| Value::Object(Default::default()));
            calls.push(ToolCall { id, name, args });
        }
        for call in &calls {
            self.emit(AgentEvent::ToolCallStarted { id: call.id.clone(), name: call.name.clone() });
        }
        Ok((text, calls))
    }

    /// Runs the given tool calls against the router. Calls are grouped into
    /// maximal runs of non-`memory_write` calls, which execute concurrently;
    /// a `memory_write` call is flushed and run alone before the next group
    /// starts, preserving append order for the memory file it mutates.
    async fn dispatch_tool_calls(&self, session_id: &str, calls: Vec<ToolCall>) -> Vec<(ToolCall, ToolOutput)> {
        let mut results = Vec::with_capacity(calls.len());
        let mut batch: Vec<ToolCall> = Vec::new();

        for call in calls {
            if call.name == "memory_write" {
                self.flush_batch(session_id, &mut batch, &mut results).await;
                let (output, audit) = self.router.dispatch(session_id, call.clone()).await;
                self.record_tool_metrics(&call, &audit);
                results.push((call, output));
            } else {
                batch.push(call);
            }
        }
        self.flush_batch(session_id, &mut batch, &mut results).await;
        results
    }

    async fn flush_batch(&self, session_id: &str, batch: &mut Vec<ToolCall>, results: &mut Vec<(ToolCall, ToolOutput)>) {
        if batch.is_empty() {
            return;
        }
        let futures = batch.drain(..).map(|call| async move {
            let (output, audit) = self.router.dispatch(session_id, call.clone()).await;
            self.record_tool_metrics(&call, &audit);
            (call, output)
        });
        results.extend(futures::future::join_all(futures).await);
    }

    fn record_tool_metrics(&self, call: &ToolCall, audit: &lunar_tools::AuditEntry) {
        let Some(metrics) = &self.metrics else { return };
        metrics.incr_counter("tool_calls_total");
        metrics.observe("tool_call_duration_ms", audit.duration_ms as f64);
        metrics.record_audit(lunar_metrics::AuditEntry {
            ts: Utc::now(),
            tool: audit.tool_name.clone(),
            args: call.args.clone(),
            allowed: audit.allowed,
            reason: if !audit.allowed {
                Some("denied".to_string())
            } else if audit.is_error {
                Some("tool execution failed".to_string())
            } else {
                None
            },
            user_id: Some(audit.session_id.clone()),
        });
    }
}

/// Replays only `User`/`Assistant` history into the live context; tool-call
/// pairing for earlier turns isn't reconstructed since only the live
/// iteration's tool calls need a real id match against the wire format.
fn history_turn_to_message(turn: &Turn) -> Option<Message> {
    match turn {
        Turn::User { content, .. } => Some(Message::user(content.clone())),
        Turn::Assistant { content, .. } if !content.is_empty() => Some(Message::assistant(content.clone())),
        _ => None,
    }
}

#[derive(Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lunar_channels::ChatType;
    use lunar_model::{MockProvider, ResponseEvent, ScriptedMockProvider};
    use lunar_tools::{PermissionManager, Tool, ToolRegistry};
    use serde_json::json;
    use tempfile::tempdir;

    struct TimeTool;

    #[async_trait]
    impl Tool for TimeTool {
        fn name(&self) -> &str {
            "time"
        }
        fn description(&self) -> &str {
            "reports the current time"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, "12:00")
        }
    }

    fn router_with_time_tool() -> ToolRouter {
        let mut registry = ToolRegistry::new();
        registry.register(TimeTool);
        let permissions = PermissionManager::from_config(&lunar_config::ToolsConfig::default());
        ToolRouter::new(registry, permissions, std::time::Duration::from_secs(5), std::time::Duration::from_secs(5))
    }

    fn envelope(text: &str) -> Envelope {
        Envelope::new("cli", "user-1", text, ChatType::Direct)
    }

    #[tokio::test]
    async fn plain_reply_is_persisted_and_returned() {
        let dir = tempdir().unwrap();
        let transcript = Arc::new(TranscriptStore::new(dir.path()));
        let provider = Box::new(MockProvider::new("mock"));
        let router = router_with_time_tool();
        let agent = Agent::new(provider, router, transcript.clone(), &Config::default());

        let reply = agent.handle_message(&envelope("hello")).await.unwrap();
        assert_eq!(reply, "MOCK: hello");

        let session_id = agent.session_id(&envelope("hello"));
        let turns = transcript.load_all(&session_id).await.unwrap();
        assert_eq!(turns.len(), 2);
    }

    #[tokio::test]
    async fn tool_call_round_trip_produces_final_text() {
        let dir = tempdir().unwrap();
        let transcript = Arc::new(TranscriptStore::new(dir.path()));
        let provider = Box::new(ScriptedMockProvider::tool_then_text("mock", "time", "{}", "it is 12:00"));
        let router = router_with_time_tool();
        let agent = Agent::new(provider, router, transcript.clone(), &Config::default());

        let reply = agent.handle_message(&envelope("what time is it")).await.unwrap();
        assert_eq!(reply, "it is 12:00");

        let session_id = agent.session_id(&envelope("what time is it"));
        let turns = transcript.load_all(&session_id).await.unwrap();
        assert!(turns.iter().any(|t| matches!(t, Turn::ToolCall { name, .. } if name == "time")));
        assert!(turns.iter().any(|t| matches!(t, Turn::ToolResult { ok: true, .. })));
    }

    #[tokio::test]
    async fn input_guard_block_short_circuits_before_model_call() {
        let dir = tempdir().unwrap();
        let transcript = Arc::new(TranscriptStore::new(dir.path()));
        let provider = Box::new(MockProvider::new("mock"));
        let router = router_with_time_tool();
        let agent = Agent::new(provider, router, transcript.clone(), &Config::default());

        let reply = agent.handle_message(&envelope("my ssn is 123-45-6789")).await.unwrap();
        assert_eq!(reply, SAFE_FALLBACK);
    }

    #[tokio::test]
    async fn max_iterations_terminates_a_tool_call_loop_that_never_stops() {
        let dir = tempdir().unwrap();
        let transcript = Arc::new(TranscriptStore::new(dir.path()));
        let scripts = (0..20)
            .map(|_| vec![ResponseEvent::ToolCall { index: 0, id: Some("c".into()), name: Some("time".into()), arguments: "{}".into() }, ResponseEvent::Done])
            .collect();
        let provider = Box::new(ScriptedMockProvider::new("mock", scripts));
        let router = router_with_time_tool();
        let mut cfg = Config::default();
        cfg.agent.max_iterations = 3;
        let agent = Agent::new(provider, router, transcript, &cfg);

        let reply = agent.handle_message(&envelope("loop forever")).await.unwrap();
        assert_eq!(reply, "Max iterations reached");
    }
}
