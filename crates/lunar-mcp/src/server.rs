// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! [`LunarMcpServer`] — the rmcp [`ServerHandler`] implementation.
//!
//! Wraps a [`ToolRegistry`] and implements the MCP `tools/list` and
//! `tools/call` protocol methods so any third-party MCP-compatible host can
//! drive the same built-in tools the agent loop uses. All other MCP
//! lifecycle methods (initialize, shutdown, ping) use rmcp's defaults.
//!
//! The server is stateless: every `call_tool` request executes the tool in
//! isolation and carries no session state between calls.

use std::sync::Arc;

use rmcp::{
    handler::server::ServerHandler,
    model::{CallToolRequestParams, CallToolResult, ListToolsResult, PaginatedRequestParams, ServerCapabilities, ServerInfo},
    service::{RequestContext, RoleServer},
    ErrorData as McpError,
};
use lunar_tools::{ToolCall, ToolRegistry};
use uuid::Uuid;

use crate::bridge::{output_to_call_result, schema_to_mcp_tool};

/// Exposes a [`ToolRegistry`] to external MCP clients over any rmcp server
/// transport.
#[derive(Clone)]
pub struct LunarMcpServer {
    registry: Arc<ToolRegistry>,
}

impl LunarMcpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

impl ServerHandler for LunarMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo { capabilities: ServerCapabilities::builder().enable_tools().build(), ..ServerInfo::default() }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let registry = self.registry.clone();
        async move {
            let tools = registry.schemas().into_iter().map(schema_to_mcp_tool).collect();
            Ok(ListToolsResult { tools, next_cursor: None, meta: None })
        }
    }

    async fn call_tool(&self, request: CallToolRequestParams, _context: RequestContext<RoleServer>) -> Result<CallToolResult, McpError> {
        let args = request.arguments.map(|m| serde_json::Value::Object(m.into_iter().collect())).unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let call = ToolCall { id: Uuid::new_v4().to_string(), name: request.name.to_string(), args };

        let output = self.registry.execute(&call).await;
        Ok(output_to_call_result(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_tools::ToolRegistry;

    fn make_server_with(tools: impl FnOnce(&mut ToolRegistry)) -> LunarMcpServer {
        let mut reg = ToolRegistry::new();
        tools(&mut reg);
        LunarMcpServer::new(Arc::new(reg))
    }

    #[test]
    fn get_info_enables_tools_capability() {
        let server = make_server_with(|_| {});
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some(), "tools capability must be enabled");
    }

    #[test]
    fn get_info_has_no_resources_capability_by_default() {
        let server = make_server_with(|_| {});
        let info = server.get_info();
        assert!(info.capabilities.resources.is_none());
        assert!(info.capabilities.prompts.is_none());
    }

    #[test]
    fn server_is_cloneable() {
        let server = make_server_with(|_| {});
        let _clone = server.clone();
    }

    #[test]
    fn empty_registry_server_reports_no_tools_in_schema() {
        let server = make_server_with(|_| {});
        assert!(server.registry.schemas().is_empty());
    }
}
