// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Type conversions between the local tool types and rmcp's MCP model types.
//!
//! These are pure, stateless functions sitting at the seam between
//! [`lunar_tools`] and the MCP wire protocol so neither side needs to know
//! about the other.

use rmcp::model::{CallToolResult, Content, JsonObject, Tool as McpTool};
use lunar_tools::{ToolOutput, ToolSchema};

/// Convert a [`ToolSchema`] into an rmcp [`Tool`] descriptor.
///
/// The JSON Schema stored in [`ToolSchema::parameters`] is already valid
/// JSON Schema produced by each tool's `parameters_schema` implementation,
/// so it is passed through as the `input_schema` without further processing.
pub fn schema_to_mcp_tool(schema: ToolSchema) -> McpTool {
    let input_schema: JsonObject = value_to_object(schema.parameters);
    McpTool::new(std::borrow::Cow::Owned(schema.name), std::borrow::Cow::Owned(schema.description), std::sync::Arc::new(input_schema))
}

/// Builds a [`JsonObject`] from a raw JSON Schema value. MCP requires the
/// schema to be a JSON object; non-object values get wrapped in a minimal
/// `{"type":"object"}` envelope.
fn value_to_object(v: serde_json::Value) -> JsonObject {
    use serde_json::{Map, Value};
    match v {
        Value::Object(m) => m,
        other => {
            let mut m = Map::new();
            m.insert("type".to_string(), Value::String("object".to_string()));
            m.insert("value".to_string(), other);
            m
        }
    }
}

/// Convert a [`ToolOutput`] into an rmcp [`CallToolResult`]. `lunar_tools`
/// tool output is plain text, so it always maps to a single text content
/// block; `is_error` mirrors [`ToolOutput::is_error`].
pub fn output_to_call_result(output: ToolOutput) -> CallToolResult {
    let content = vec![Content::text(output.content)];
    if output.is_error {
        CallToolResult { content, is_error: Some(true), structured_content: None, meta: None }
    } else {
        CallToolResult::success(content)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use lunar_tools::ToolOutput;

    use super::*;

    fn make_schema(name: &str, desc: &str, params: Value) -> ToolSchema {
        ToolSchema { name: name.to_string(), description: desc.to_string(), parameters: params }
    }

    #[test]
    fn schema_to_mcp_tool_preserves_name_and_description() {
        let schema = make_schema("read_file", "Reads a file", json!({"type":"object"}));
        let tool = schema_to_mcp_tool(schema);
        assert_eq!(tool.name.as_ref(), "read_file");
        assert_eq!(tool.description.as_deref(), Some("Reads a file"));
    }

    #[test]
    fn schema_to_mcp_tool_object_schema_passes_through() {
        let schema = make_schema("grep", "Greps", json!({"type": "object", "properties": {"pattern": {"type": "string"}}}));
        let tool = schema_to_mcp_tool(schema);
        assert!(tool.input_schema.contains_key("type"));
    }

    #[test]
    fn schema_to_mcp_tool_non_object_schema_gets_wrapped() {
        let schema = make_schema("echo", "Echoes", json!("not an object"));
        let tool = schema_to_mcp_tool(schema);
        assert_eq!(tool.input_schema.get("type"), Some(&Value::String("object".to_string())));
    }

    #[test]
    fn output_to_call_result_text_success() {
        let out = ToolOutput::ok("id1", "hello world");
        let result = output_to_call_result(out);
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn output_to_call_result_error_flag_set() {
        let out = ToolOutput::err("id2", "something went wrong");
        let result = output_to_call_result(out);
        assert_eq!(result.is_error, Some(true));
        assert_eq!(result.content.len(), 1);
    }
}
