// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

/// Default number of lines returned when the caller does not specify a limit.
/// Kept small to avoid flooding the model context on the first read; the
/// caller can paginate with offset + limit to get more.
const DEFAULT_LINE_LIMIT: usize = 200;

/// Hard byte ceiling applied in addition to the line limit. Whichever
/// constraint is hit first determines where the output is cut.
const MAX_BYTES: usize = 20_000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a text file. Default: 200 lines / 20 KB — whichever comes first.\n\
         Lines are formatted as L{n}:content (1-indexed). When more lines exist,\n\
         a pagination notice shows the offset to continue from. Binary files are\n\
         reported as binary rather than dumped."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-indexed line number to start reading from (default 1)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default 200)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::FileContent
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };
        let offset = call.args.get("offset").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_LINE_LIMIT as u64) as usize;

        debug!(path = %path, offset, limit, "read_file tool");

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };

        let ext = std::path::Path::new(&path).extension().and_then(|e| e.to_str()).unwrap_or("");
        if is_binary_extension(ext) || has_binary_content(&bytes) {
            return ToolOutput::ok(&call.id, format!("note: {path} is a binary file ({} bytes); binary content is not rendered", bytes.len()));
        }

        let text = String::from_utf8_lossy(&bytes);
        let start = offset.saturating_sub(1);
        let all_lines: Vec<&str> = text.lines().collect();
        let total = all_lines.len();

        let mut selected: Vec<String> = Vec::new();
        let mut byte_count: usize = 0;
        let mut truncated_by_bytes = false;
        for (i, line) in all_lines.iter().enumerate().skip(start).take(limit) {
            let line_bytes = line.len() + 1;
            if byte_count + line_bytes > MAX_BYTES {
                truncated_by_bytes = true;
                break;
            }
            selected.push(format!("L{}:{}", i + 1, line));
            byte_count += line_bytes;
        }

        let last_shown = start + selected.len();
        let mut content = selected.join("\n");

        if last_shown < total {
            let reason = if truncated_by_bytes { format!("byte limit ({MAX_BYTES} B) reached") } else { format!("{} more lines", total - last_shown) };
            content.push_str(&format!(
                "\n...[{} — showing L{}-L{} of {}; use offset={} to continue]",
                reason,
                offset,
                offset + selected.len().saturating_sub(1),
                total,
                last_shown + 1
            ));
        }

        ToolOutput::ok(&call.id, content)
    }
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "o" | "a" | "so" | "elf" | "exe" | "dll" | "wasm" | "pdb" | "zip" | "gz" | "tar" | "bz2" | "xz" | "7z" | "zst" | "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tiff" | "ico" | "pdf"
    )
}

/// Samples the first 8 KB of `bytes`: a NUL byte, or more than 30% of bytes
/// outside the printable ASCII / common-whitespace range, marks it binary.
fn has_binary_content(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(8192)];
    if sample.contains(&0) {
        return true;
    }
    if sample.is_empty() {
        return false;
    }
    let non_printable = sample.iter().filter(|&&b| !(b.is_ascii_graphic() || b == b' ' || b == b'\n' || b == b'\r' || b == b'\t')).count();
    (non_printable as f64 / sample.len() as f64) > 0.30
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn read(path: &std::path::Path, offset: Option<u64>, limit: Option<u64>) -> ToolOutput {
        let mut args = json!({"path": path.to_string_lossy()});
        if let Some(o) = offset {
            args["offset"] = json!(o);
        }
        if let Some(l) = limit {
            args["limit"] = json!(l);
        }
        let call = ToolCall { id: "1".into(), name: "read_file".into(), args };
        ReadFileTool.execute(&call).await
    }

    #[tokio::test]
    async fn reads_whole_small_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();
        let out = read(&path, None, None).await;
        assert!(out.content.contains("L1:one"));
        assert!(out.content.contains("L3:three"));
    }

    #[tokio::test]
    async fn respects_offset_and_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();
        let out = read(&path, Some(2), Some(1)).await;
        assert!(out.content.contains("L2:two"));
        assert!(!out.content.contains("L3:"));
    }

    #[tokio::test]
    async fn pagination_notice_shown_when_more_lines_remain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();
        let out = read(&path, None, Some(1)).await;
        assert!(out.content.contains("more lines"));
    }

    #[tokio::test]
    async fn missing_path_is_error() {
        let call = ToolCall { id: "1".into(), name: "read_file".into(), args: json!({}) };
        let out = ReadFileTool.execute(&call).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn nonexistent_file_is_error() {
        let out = read(std::path::Path::new("/no/such/file.txt"), None, None).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn binary_content_is_reported_not_dumped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, [0u8, 1, 2, 3, 255, 254]).unwrap();
        let out = read(&path, None, None).await;
        assert!(out.content.contains("binary file"));
    }

    #[test]
    fn has_binary_content_detects_null_byte() {
        assert!(has_binary_content(&[b'a', 0, b'b']));
    }

    #[test]
    fn has_binary_content_false_for_plain_text() {
        assert!(!has_binary_content(b"hello world\n"));
    }
}
