// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use lunar_memory::MemoryStore;
use serde_json::{json, Value};

use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

pub struct MemorySearchTool {
    store: Arc<MemoryStore>,
}

impl MemorySearchTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Hybrid (lexical + vector) search over the markdown memory store.\n\
         Returns the most relevant chunks, most relevant first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Natural-language search query"},
                "limit": {"type": "integer", "description": "Maximum number of results (optional)"}
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::MatchList
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let query = match call.args.get("query").and_then(|v| v.as_str()) {
            Some(q) => q,
            None => return ToolOutput::err(&call.id, "missing required parameter 'query'"),
        };
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let result = match limit {
            Some(limit) => self.store.search_with_limit(query, limit).await,
            None => self.store.search(query).await,
        };

        match result {
            Ok(hits) if hits.is_empty() => ToolOutput::ok(&call.id, "no matching memory entries"),
            Ok(hits) => {
                let body = hits
                    .iter()
                    .enumerate()
                    .map(|(i, h)| format!("{}. [{}] (score {:.3})\n{}", i + 1, h.file_path, h.score, h.content))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                ToolOutput::ok(&call.id, body)
            }
            Err(e) => ToolOutput::err(&call.id, format!("memory search failed: {e}")),
        }
    }
}
