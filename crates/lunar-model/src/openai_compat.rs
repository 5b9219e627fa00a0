// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! A single OpenAI-compatible provider, used both for hosted OpenAI-style
//! endpoints and for local servers (Ollama, llama.cpp, vLLM, LM Studio) that
//! speak the same `/chat/completions` wire format over a custom `base_url`.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};

use crate::{
    CompletionRequest, FunctionCallRepr, Message, MessageContent, ModelProvider, Role,
    ResponseEvent, ResponseStream, ToolResultContent, Usage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    Bearer,
    ApiKeyHeader,
    None,
}

pub struct OpenAICompatProvider {
    driver_name: String,
    model: String,
    api_key: Option<String>,
    chat_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    client: reqwest::Client,
    auth_style: AuthStyle,
}

impl OpenAICompatProvider {
    pub fn new(
        driver_name: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: &str,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        auth_style: AuthStyle,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self::with_full_chat_url(
            driver_name,
            model,
            api_key,
            format!("{base}/chat/completions"),
            max_tokens,
            temperature,
            auth_style,
        )
    }

    pub fn with_full_chat_url(
        driver_name: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        chat_url: impl Into<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        auth_style: AuthStyle,
    ) -> Self {
        Self {
            driver_name: driver_name.into(),
            model: model.into(),
            api_key,
            chat_url: chat_url.into(),
            max_tokens,
            temperature,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .expect("reqwest client"),
            auth_style,
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.driver_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let mut body = json!({
            "model": self.model,
            "messages": build_openai_messages(&req),
            "stream": true,
        });
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(mt) = self.max_tokens {
            let key = if self.driver_name == "openai" { "max_completion_tokens" } else { "max_tokens" };
            body[key] = json!(mt);
        }
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }

        let mut request = self.client.post(&self.chat_url).json(&body);
        request = match self.auth_style {
            AuthStyle::Bearer => {
                if let Some(key) = &self.api_key {
                    request.bearer_auth(key)
                } else {
                    request
                }
            }
            AuthStyle::ApiKeyHeader => {
                if let Some(key) = &self.api_key {
                    request.header("api-key", key)
                } else {
                    request
                }
            }
            AuthStyle::None => request,
        };

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("completion request failed ({status}): {text}");
        }

        let byte_stream = resp.bytes_stream();
        let events = sse_event_stream(byte_stream);
        Ok(Box::pin(events))
    }
}

fn sse_event_stream(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>> {
    let mut buffer = String::new();
    let stream = byte_stream.flat_map(move |chunk| {
        let mut events = Vec::new();
        match chunk {
            Ok(bytes) => {
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                for line in drain_complete_sse_lines(&mut buffer) {
                    if let Some(data) = parse_sse_data_line(&line) {
                        if data == "[DONE]" {
                            events.push(Ok(ResponseEvent::Done));
                            continue;
                        }
                        match serde_json::from_str::<Value>(data) {
                            Ok(v) => events.extend(parse_sse_chunk(&v).into_iter().map(Ok)),
                            Err(e) => events.push(Err(anyhow::anyhow!("bad SSE json: {e}"))),
                        }
                    }
                }
            }
            Err(e) => events.push(Err(anyhow::anyhow!(e))),
        }
        futures::stream::iter(events)
    });
    Box::pin(stream)
}

/// Extracts the `data: ...` payload from a single SSE line, if present.
fn parse_sse_data_line(line: &str) -> Option<&str> {
    line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))
}

/// Pulls every complete `\n`-terminated line out of `buffer`, leaving any
/// trailing partial line for the next chunk. SSE payloads can be split
/// across arbitrary TCP chunk boundaries, so this must not assume a line
/// arrives whole.
fn drain_complete_sse_lines(buffer: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.find('\n') {
        let line: String = buffer.drain(..=pos).collect();
        let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }
    lines
}

/// Parses one decoded SSE JSON chunk into zero or more response events.
/// A chunk can simultaneously report a tool-call delta, a text delta, and
/// (on the final chunk) usage and finish_reason.
fn parse_sse_chunk(v: &Value) -> Vec<ResponseEvent> {
    let mut out = Vec::new();

    if let Some(usage) = v.get("usage") {
        out.push(ResponseEvent::Usage {
            usage: Usage {
                input_tokens: usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
                output_tokens: usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
                cache_read_tokens: usage
                    .get("prompt_tokens_details")
                    .and_then(|d| d.get("cached_tokens"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
                cache_write_tokens: 0,
            },
        });
    }

    let Some(choice) = v.get("choices").and_then(|c| c.get(0)) else {
        return out;
    };

    if choice.get("finish_reason").and_then(Value::as_str) == Some("length") {
        out.push(ResponseEvent::MaxTokens);
    }

    let Some(delta) = choice.get("delta") else {
        return out;
    };

    if let Some(reasoning) = delta
        .get("reasoning_content")
        .or_else(|| delta.get("reasoning"))
        .and_then(Value::as_str)
    {
        if !reasoning.is_empty() {
            out.push(ResponseEvent::ThinkingDelta { text: reasoning.to_string() });
        }
    }

    if let Some(content) = delta.get("content").and_then(Value::as_str) {
        if !content.is_empty() {
            out.push(ResponseEvent::TextDelta { text: content.to_string() });
        }
    }

    if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
        for tc in tool_calls {
            let index = tc.get("index").and_then(Value::as_u64).unwrap_or(0) as u32;
            let id = tc.get("id").and_then(Value::as_str).map(str::to_string);
            let name = tc
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let arguments = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            out.push(ResponseEvent::ToolCall { index, id, name, arguments });
        }
    }

    out
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Converts internal messages into OpenAI wire JSON. Consecutive assistant
/// `ToolCall` messages are coalesced into a single assistant message with a
/// `tool_calls` array, matching OpenAI's parallel-tool-call contract.
fn build_openai_messages(req: &CompletionRequest) -> Vec<Value> {
    let mut out = Vec::new();
    let mut pending_tool_calls: Vec<(String, FunctionCallRepr)> = Vec::new();

    let flush = |out: &mut Vec<Value>, pending: &mut Vec<(String, FunctionCallRepr)>| {
        if pending.is_empty() {
            return;
        }
        let tool_calls: Vec<Value> = pending
            .drain(..)
            .map(|(id, f)| {
                json!({
                    "id": id,
                    "type": "function",
                    "function": { "name": f.name, "arguments": f.arguments },
                })
            })
            .collect();
        out.push(json!({ "role": "assistant", "content": null, "tool_calls": tool_calls }));
    };

    for msg in &req.messages {
        match &msg.content {
            MessageContent::ToolCall { tool_call_id, function } => {
                pending_tool_calls.push((tool_call_id.clone(), function.clone()));
                continue;
            }
            _ => flush(&mut out, &mut pending_tool_calls),
        }

        match &msg.content {
            MessageContent::Text(text) => {
                out.push(json!({ "role": role_str(msg.role), "content": text }));
            }
            MessageContent::ContentParts(parts) => {
                let parts_json: Vec<Value> = parts
                    .iter()
                    .map(|p| match p {
                        crate::ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                        crate::ContentPart::Image { image_url, detail } => json!({
                            "type": "image_url",
                            "image_url": { "url": image_url, "detail": detail.clone().unwrap_or_else(|| "auto".into()) },
                        }),
                    })
                    .collect();
                out.push(json!({ "role": role_str(msg.role), "content": parts_json }));
            }
            MessageContent::ToolResult { tool_call_id, content } => {
                let text = match content {
                    ToolResultContent::Text(t) => t.clone(),
                    ToolResultContent::Parts(_) => content.as_text(),
                };
                out.push(json!({ "role": "tool", "tool_call_id": tool_call_id, "content": text }));
            }
            MessageContent::ToolCall { .. } => unreachable!("handled above"),
        }
    }
    flush(&mut out, &mut pending_tool_calls);

    if let Some(suffix) = &req.system_dynamic_suffix {
        if let Some(first) = out.first_mut() {
            if first.get("role").and_then(Value::as_str) == Some("system") {
                if let Some(content) = first.get("content").and_then(Value::as_str) {
                    let merged = format!("{content}\n\n{suffix}");
                    first["content"] = json!(merged);
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_complete_sse_lines_handles_split_chunk() {
        let mut buf = String::from("data: {\"a\":");
        assert!(drain_complete_sse_lines(&mut buf).is_empty());
        buf.push_str("1}\n");
        let lines = drain_complete_sse_lines(&mut buf);
        assert_eq!(lines, vec!["data: {\"a\":1}"]);
    }

    #[test]
    fn drain_complete_sse_lines_handles_multiple_lines_in_one_chunk() {
        let mut buf = String::from("data: {\"a\":1}\ndata: {\"b\":2}\n");
        let lines = drain_complete_sse_lines(&mut buf);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn parse_sse_data_line_strips_prefix() {
        assert_eq!(parse_sse_data_line("data: [DONE]"), Some("[DONE]"));
        assert_eq!(parse_sse_data_line("data:[DONE]"), Some("[DONE]"));
    }

    #[test]
    fn parse_sse_chunk_extracts_text_delta() {
        let v: Value = serde_json::from_str(r#"{"choices":[{"delta":{"content":"hi"}}]}"#).unwrap();
        let events = parse_sse_chunk(&v);
        assert!(matches!(events[0], ResponseEvent::TextDelta { .. }));
    }

    #[test]
    fn parse_sse_chunk_extracts_reasoning_content() {
        let v: Value =
            serde_json::from_str(r#"{"choices":[{"delta":{"reasoning_content":"thinking..."}}]}"#).unwrap();
        let events = parse_sse_chunk(&v);
        assert!(matches!(events[0], ResponseEvent::ThinkingDelta { .. }));
    }

    #[test]
    fn parse_sse_chunk_extracts_tool_call_with_index() {
        let v: Value = serde_json::from_str(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"time","arguments":"{}"}}]}}]}"#,
        )
        .unwrap();
        let events = parse_sse_chunk(&v);
        match &events[0] {
            ResponseEvent::ToolCall { index, name, .. } => {
                assert_eq!(*index, 0);
                assert_eq!(name.as_deref(), Some("time"));
            }
            _ => panic!("expected tool call"),
        }
    }

    #[test]
    fn parse_sse_chunk_extracts_max_tokens() {
        let v: Value = serde_json::from_str(r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#).unwrap();
        let events = parse_sse_chunk(&v);
        assert!(events.iter().any(|e| matches!(e, ResponseEvent::MaxTokens)));
    }

    #[test]
    fn parse_sse_chunk_extracts_usage() {
        let v: Value =
            serde_json::from_str(r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5}}"#).unwrap();
        let events = parse_sse_chunk(&v);
        match &events[0] {
            ResponseEvent::Usage { usage } => {
                assert_eq!(usage.input_tokens, 10);
                assert_eq!(usage.output_tokens, 5);
            }
            _ => panic!("expected usage"),
        }
    }

    #[test]
    fn build_openai_messages_coalesces_parallel_tool_calls() {
        let req = CompletionRequest {
            messages: vec![
                Message::user("do two things"),
                Message::tool_call("c1", "time", "{}"),
                Message::tool_call("c2", "weather", "{}"),
            ],
            tools: vec![],
            stream: true,
            system_dynamic_suffix: None,
        };
        let msgs = build_openai_messages(&req);
        let assistant_msg = msgs.iter().find(|m| m["role"] == "assistant").unwrap();
        assert_eq!(assistant_msg["tool_calls"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn build_openai_messages_appends_dynamic_system_suffix() {
        let req = CompletionRequest {
            messages: vec![Message::system("base prompt"), Message::user("hi")],
            tools: vec![],
            stream: true,
            system_dynamic_suffix: Some("relevant memory: likes tea".into()),
        };
        let msgs = build_openai_messages(&req);
        let content = msgs[0]["content"].as_str().unwrap();
        assert!(content.contains("relevant memory: likes tea"));
    }

    #[test]
    fn build_openai_messages_serializes_tool_result() {
        let req = CompletionRequest {
            messages: vec![Message::tool_result("c1", "42")],
            tools: vec![],
            stream: true,
            system_dynamic_suffix: None,
        };
        let msgs = build_openai_messages(&req);
        assert_eq!(msgs[0]["role"], "tool");
        assert_eq!(msgs[0]["content"], "42");
    }
}
