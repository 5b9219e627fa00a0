// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Client-side connections to external tool-protocol servers.
//!
//! Each configured server is connected to over stdio (subprocess) or SSE
//! (HTTP) transport at startup. Tools discovered on a server are namespaced
//! as `mcp_{server}_{tool}` and exposed to the rest of the runtime through
//! [`RemoteToolManager`].

use std::collections::HashMap;
use std::process::Stdio;

use anyhow::{Context, Result};
use lunar_config::{McpServerConfig, McpTransport};
use lunar_tools::{RemoteToolManager, ToolSchema};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ClientCapabilities, ClientInfo, Implementation, ProtocolVersion, Tool as RmcpTool,
};
use rmcp::service::{DynService, Peer, RunningService};
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::transport::SseClientTransport;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;

type RunningClient = RunningService<RoleClient, Box<dyn DynService<RoleClient>>>;

struct ConnectedServer {
    peer: Peer<RoleClient>,
    // Held for its lifetime: dropping it tears down the transport.
    _running: RunningClient,
}

/// Connects to every configured external tool-protocol server and routes
/// tool calls to whichever server owns the namespaced name.
pub struct McpClientManager {
    servers: Vec<ConnectedServer>,
    schemas: Vec<ToolSchema>,
    routes: HashMap<String, (usize, String)>,
}

impl McpClientManager {
    /// Connects to every server in `configs`. A server that fails to connect
    /// is logged and skipped; the manager still serves tools from the
    /// servers that connected successfully.
    pub async fn connect(configs: &HashMap<String, McpServerConfig>) -> Self {
        let client_impl = Implementation::new("lunar", env!("CARGO_PKG_VERSION"));

        let mut servers = Vec::new();
        let mut schemas = Vec::new();
        let mut routes = HashMap::new();

        for (name, cfg) in configs {
            match connect_one(cfg, &client_impl).await {
                Ok((peer, running, tools)) => {
                    let index = servers.len();
                    for tool in tools {
                        let namespaced = namespace(name, tool.name.as_ref());
                        if routes.contains_key(&namespaced) {
                            tracing::warn!(tool = %namespaced, "duplicate MCP tool name, keeping first instance");
                            continue;
                        }
                        schemas.push(ToolSchema {
                            name: namespaced.clone(),
                            description: tool.description.as_ref().to_string(),
                            parameters: Value::Object((*tool.input_schema).clone()),
                        });
                        routes.insert(namespaced, (index, tool.name.as_ref().to_string()));
                    }
                    servers.push(ConnectedServer { peer, _running: running });
                }
                Err(err) => {
                    tracing::warn!(server = %name, error = %err, "failed to connect to MCP server, skipping");
                }
            }
        }

        Self { servers, schemas, routes }
    }

    /// True if no server connected successfully.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

fn namespace(server: &str, tool: &str) -> String {
    format!("mcp_{server}_{tool}")
}

async fn connect_one(cfg: &McpServerConfig, client_impl: &Implementation) -> Result<(Peer<RoleClient>, RunningClient, Vec<RmcpTool>)> {
    let client_info = ClientInfo {
        protocol_version: ProtocolVersion::default(),
        capabilities: ClientCapabilities::default(),
        client_info: client_impl.clone(),
    };

    let running: RunningClient = match cfg.transport {
        McpTransport::Stdio => {
            let command = cfg.command.as_deref().context("stdio MCP server requires `command`")?;
            let mut proc = tokio::process::Command::new(resolve_placeholders(command));
            proc.args(cfg.args.iter().map(|a| resolve_placeholders(a)))
                .envs(cfg.env.iter().map(|(k, v)| (k.clone(), resolve_placeholders(v))))
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit());
            let transport = TokioChildProcess::new(proc).context("spawning MCP server subprocess")?;
            client_info.clone().into_dyn().serve(transport).await.context("starting stdio MCP transport")?
        }
        McpTransport::Http => {
            let url = cfg.url.as_deref().context("http MCP server requires `url`")?;
            let transport = SseClientTransport::start(url.to_string()).await.context("connecting SSE MCP transport")?;
            client_info.clone().into_dyn().serve(transport).await.context("starting SSE MCP transport")?
        }
    };

    let peer = running.peer().clone();
    let tools = peer.list_all_tools().await.context("listing tools on MCP server")?;
    Ok((peer, running, tools))
}

/// Resolves `${VAR}` placeholders against the current process environment.
/// Unresolvable placeholders are left verbatim.
fn resolve_placeholders(value: &str) -> String {
    let mut out = String::new();
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start..].find('}') {
            Some(len) => {
                let var = &rest[start + 2..start + len];
                match std::env::var(var) {
                    Ok(resolved) => out.push_str(&resolved),
                    Err(_) => out.push_str(&rest[start..start + len + 1]),
                }
                rest = &rest[start + len + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[async_trait::async_trait]
impl RemoteToolManager for McpClientManager {
    async fn call(&self, namespaced_name: &str, args: Value) -> Result<String> {
        let (index, tool_name) = self.routes.get(namespaced_name).context("unknown MCP tool")?;
        let server = self.servers.get(*index).context("MCP server no longer connected")?;

        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                Some(map)
            }
        };

        let result = server
            .peer
            .call_tool(CallToolRequestParam { name: tool_name.clone().into(), arguments })
            .await
            .with_context(|| format!("calling MCP tool {namespaced_name}"))?;
        Ok(extract_text(&result))
    }

    fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.schemas.clone()
    }
}

fn extract_text(result: &CallToolResult) -> String {
    let text = result.content.iter().filter_map(|c| c.as_text().map(|t| t.text.clone())).collect::<Vec<_>>().join("\n");
    if text.is_empty() {
        serde_json::to_string(result).unwrap_or_default()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_joins_server_and_tool() {
        assert_eq!(namespace("notes", "search"), "mcp_notes_search");
    }

    #[test]
    fn resolve_placeholders_substitutes_known_var() {
        std::env::set_var("LUNAR_MCP_TEST_VAR", "value123");
        assert_eq!(resolve_placeholders("token=${LUNAR_MCP_TEST_VAR}"), "token=value123");
        std::env::remove_var("LUNAR_MCP_TEST_VAR");
    }

    #[test]
    fn resolve_placeholders_leaves_unknown_var_verbatim() {
        assert_eq!(resolve_placeholders("token=${LUNAR_MCP_DOES_NOT_EXIST}"), "token=${LUNAR_MCP_DOES_NOT_EXIST}");
    }

    #[test]
    fn resolve_placeholders_passes_through_plain_text() {
        assert_eq!(resolve_placeholders("plain"), "plain");
    }

    #[tokio::test]
    async fn connect_skips_unreachable_server_without_panicking() {
        let mut configs = HashMap::new();
        configs.insert(
            "broken".to_string(),
            McpServerConfig { transport: McpTransport::Stdio, command: Some("lunar-mcp-test-nonexistent-binary".into()), args: vec![], env: HashMap::new(), url: None },
        );
        let manager = McpClientManager::connect(&configs).await;
        assert!(manager.is_empty());
        assert!(manager.tool_schemas().is_empty());
    }
}
