// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use lunar_memory::MemoryStore;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct MemoryWriteTool {
    store: Arc<MemoryStore>,
}

impl MemoryWriteTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryWriteTool {
    fn name(&self) -> &str {
        "memory_write"
    }

    fn description(&self) -> &str {
        "Appends a new dated entry to the markdown memory store and re-indexes it\n\
         immediately, so it is searchable by memory_search right away."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "heading": {"type": "string", "description": "Short heading for the new entry"},
                "content": {"type": "string", "description": "Body text of the new entry"}
            },
            "required": ["heading", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let heading = match call.args.get("heading").and_then(|v| v.as_str()) {
            Some(h) => h,
            None => return ToolOutput::err(&call.id, "missing required parameter 'heading'"),
        };
        let content = match call.args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ToolOutput::err(&call.id, "missing required parameter 'content'"),
        };

        match self.store.write(heading, content).await {
            Ok(path) => ToolOutput::ok(&call.id, format!("wrote entry to {}", path.display())),
            Err(e) => ToolOutput::err(&call.id, format!("memory write failed: {e}")),
        }
    }
}
