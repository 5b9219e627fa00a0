// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! External tool-protocol integration: both directions.
//!
//! * **Client** ([`client`]): connects to every server configured under
//!   `mcp_servers` (stdio subprocess or SSE transport), discovers its tools,
//!   and exposes them to the tool router behind
//!   [`lunar_tools::RemoteToolManager`], namespaced as `mcp_{server}_{tool}`.
//! * **Server** ([`server`], [`bridge`], [`serve_stdio`]): exposes the
//!   runtime's own built-in tools to any MCP-compatible host (Cursor, Claude
//!   Desktop, etc.) over stdio, so this runtime can itself be plugged into
//!   another agent as a tool provider.
//!
//! ```text
//! Config.mcp_servers  ──►  McpClientManager::connect  ──►  ToolRouter::with_remote_manager
//! ToolRegistry        ──►  serve_stdio                ──►  external MCP host
//! ```

pub mod bridge;
pub mod client;
pub mod server;

pub use client::McpClientManager;
pub use server::LunarMcpServer;

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;
use lunar_tools::ToolRegistry;

/// Starts an MCP stdio server exposing every tool in `registry`. Blocks
/// until the client disconnects (stdin EOF) or the process is terminated.
pub async fn serve_stdio(registry: Arc<ToolRegistry>) -> Result<()> {
    let server = LunarMcpServer::new(registry);
    let running = server.serve((tokio::io::stdin(), tokio::io::stdout())).await.map_err(|e| anyhow::anyhow!("MCP server init error: {e}"))?;
    running.waiting().await.map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
    Ok(())
}
