// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use walkdir::WalkDir;

use crate::tool::{Tool, ToolCall, ToolOutput};

const DEFAULT_DEPTH: usize = 2;
const MAX_DEPTH: usize = 5;
const DEFAULT_LIMIT: usize = 100;

const EXCLUDED: &[&str] = &[".git", "target", "node_modules", ".svn", "__pycache__", ".mypy_cache"];

pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "Lists directory contents up to a depth (default 2, max 5). Directories are\n\
         suffixed with '/'. Entries are sorted directories-first, then alphabetically."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to list"},
                "depth": {"type": "integer", "description": "Recursion depth (default 2, max 5)"},
                "limit": {"type": "integer", "description": "Maximum number of entries to return (default 100)"}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };
        let depth = (call.args.get("depth").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_DEPTH as u64) as usize).min(MAX_DEPTH);
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_LIMIT as u64) as usize;

        let root = std::path::Path::new(&path);
        if !root.is_dir() {
            return ToolOutput::err(&call.id, format!("not a directory: {path}"));
        }

        let mut entries: Vec<(bool, String)> = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(depth + 1)
            .into_iter()
            .filter_entry(|e| e.file_name().to_str().map(|n| !EXCLUDED.contains(&n)).unwrap_or(true))
            .filter_map(|e| e.ok())
        {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let is_dir = entry.file_type().is_dir();
            let mut label = relative.to_string_lossy().into_owned();
            if is_dir {
                label.push('/');
            }
            entries.push((is_dir, label));
        }

        entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let total = entries.len();
        let shown: Vec<String> = entries.into_iter().take(limit).map(|(_, label)| label).collect();
        let mut content = shown.join("\n");
        if total > limit {
            content.push_str(&format!("\n...[{} more entries truncated]", total - limit));
        }
        ToolOutput::ok(&call.id, content)
    }
}
