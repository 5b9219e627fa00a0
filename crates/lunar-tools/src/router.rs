// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Dispatches a [`ToolCall`] to a builtin or remote tool, gated by
//! [`PermissionManager`] and, when required, an operator approval callback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::permission::{Decision, PermissionManager, RiskLevel};
use crate::registry::{ToolRegistry, ToolSchema};
use crate::tool::{ToolCall, ToolOutput};

/// Implemented by the external tool-protocol client/manager so
/// [`ToolRouter`] can dispatch to remote tools without this crate depending
/// on the protocol client crate (which in turn depends on this crate to
/// expose these builtins as a server).
#[async_trait]
pub trait RemoteToolManager: Send + Sync {
    async fn call(&self, namespaced_name: &str, args: Value) -> anyhow::Result<String>;
    fn tool_schemas(&self) -> Vec<ToolSchema>;
}

#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub session_id: String,
    pub tool_name: String,
    pub args: Value,
    pub risk: RiskLevel,
}

pub type ApprovalCallback = Arc<dyn Fn(ApprovalRequest) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub session_id: String,
    pub tool_name: String,
    pub allowed: bool,
    pub required_approval: bool,
    pub is_error: bool,
    pub timestamp_ms: u128,
    pub duration_ms: u128,
}

pub struct ToolRouter {
    registry: ToolRegistry,
    permissions: PermissionManager,
    remote: Option<Arc<dyn RemoteToolManager>>,
    approval_callback: Option<ApprovalCallback>,
    default_timeout: Duration,
    shell_timeout: Duration,
}

impl ToolRouter {
    pub fn new(registry: ToolRegistry, permissions: PermissionManager, default_timeout: Duration, shell_timeout: Duration) -> Self {
        Self { registry, permissions, remote: None, approval_callback: None, default_timeout, shell_timeout }
    }

    pub fn with_remote_manager(mut self, remote: Arc<dyn RemoteToolManager>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_approval_callback(mut self, callback: ApprovalCallback) -> Self {
        self.approval_callback = Some(callback);
        self
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas = self.registry.schemas();
        if let Some(remote) = &self.remote {
            schemas.extend(remote.tool_schemas());
        }
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Runs the full dispatch pipeline for one call: permission check,
    /// optional approval, timeout-bounded execution, quota bookkeeping.
    pub async fn dispatch(&self, session_id: &str, call: ToolCall) -> (ToolOutput, AuditEntry) {
        let started = now_ms();
        let decision = self.permissions.decide(session_id, &call.name, &call.args);

        let allowed = match decision {
            Decision::Allow => true,
            Decision::Deny(reason) => {
                return self.finish(session_id, &call.name, started, false, false, ToolOutput::err(&call.id, reason));
            }
            Decision::RequiresApproval(risk) => match &self.approval_callback {
                Some(callback) => {
                    let request = ApprovalRequest { session_id: session_id.to_string(), tool_name: call.name.clone(), args: call.args.clone(), risk };
                    callback(request).await
                }
                None => false,
            },
        };

        if !allowed {
            let output = ToolOutput::err(&call.id, format!("{} requires approval, which was not granted", call.name));
            return self.finish(session_id, &call.name, started, false, true, output);
        }

        let timeout = if call.name == "bash" { self.shell_timeout } else { self.default_timeout };
        let output = self.execute(timeout, &call).await;
        self.permissions.record_execution(session_id, &call.name);
        self.finish(session_id, &call.name, started, true, matches!(decision, Decision::RequiresApproval(_)), output)
    }

    async fn execute(&self, timeout: Duration, call: &ToolCall) -> ToolOutput {
        if let Some(tool) = self.registry.get(&call.name) {
            return match tokio::time::timeout(timeout, tool.execute(call)).await {
                Ok(output) => output,
                Err(_) => ToolOutput::err(&call.id, format!("{} timed out after {:?}", call.name, timeout)),
            };
        }

        if let Some(remote) = &self.remote {
            return match tokio::time::timeout(timeout, remote.call(&call.name, call.args.clone())).await {
                Ok(Ok(content)) => ToolOutput::ok(&call.id, content),
                Ok(Err(err)) => ToolOutput::err(&call.id, err.to_string()),
                Err(_) => ToolOutput::err(&call.id, format!("{} timed out after {:?}", call.name, timeout)),
            };
        }

        ToolOutput::err(&call.id, format!("unknown tool: {}", call.name))
    }

    fn finish(&self, session_id: &str, tool_name: &str, started: u128, allowed: bool, required_approval: bool, output: ToolOutput) -> (ToolOutput, AuditEntry) {
        let entry = AuditEntry {
            session_id: session_id.to_string(),
            tool_name: tool_name.to_string(),
            allowed,
            required_approval,
            is_error: output.is_error,
            timestamp_ms: started,
            duration_ms: now_ms().saturating_sub(started),
        };
        (output, entry)
    }
}

fn now_ms() -> u128 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lunar_config::ToolsConfig;
    use serde_json::json;

    use crate::tool::{Tool, ToolOutput};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "time"
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, "now")
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "time"
        }
        fn description(&self) -> &str {
            "slow"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ToolOutput::ok(&call.id, "done")
        }
    }

    fn router_with(tool: impl Tool + 'static) -> ToolRouter {
        let mut registry = ToolRegistry::new();
        registry.register(tool);
        let permissions = PermissionManager::from_config(&ToolsConfig::default());
        ToolRouter::new(registry, permissions, Duration::from_secs(5), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn allowed_tool_executes_and_returns_output() {
        let router = router_with(EchoTool);
        let call = ToolCall { id: "1".into(), name: "time".into(), args: json!({}) };
        let (out, audit) = router.dispatch("s1", call).await;
        assert!(!out.is_error);
        assert!(audit.allowed);
    }

    #[tokio::test]
    async fn unknown_tool_is_denied_before_execution() {
        let router = router_with(EchoTool);
        let call = ToolCall { id: "1".into(), name: "nope".into(), args: json!({}) };
        let (out, audit) = router.dispatch("s1", call).await;
        assert!(out.is_error);
        assert!(!audit.allowed);
    }

    #[tokio::test]
    async fn approval_required_tool_without_callback_is_denied() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let mut permissions = PermissionManager::from_config(&ToolsConfig::default());
        permissions.register(crate::permission::Permission::approval_required(
            "time",
            crate::permission::PermissionLevel::Read,
            RiskLevel::High,
            "test",
        ));
        let router = ToolRouter::new(registry, permissions, Duration::from_secs(5), Duration::from_secs(5));
        let call = ToolCall { id: "1".into(), name: "time".into(), args: json!({}) };
        let (out, audit) = router.dispatch("s1", call).await;
        assert!(out.is_error);
        assert!(audit.required_approval);
    }

    #[tokio::test]
    async fn approval_callback_granting_allows_execution() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let mut permissions = PermissionManager::from_config(&ToolsConfig::default());
        permissions.register(crate::permission::Permission::approval_required(
            "time",
            crate::permission::PermissionLevel::Read,
            RiskLevel::High,
            "test",
        ));
        let router = ToolRouter::new(registry, permissions, Duration::from_secs(5), Duration::from_secs(5))
            .with_approval_callback(Arc::new(|_req| Box::pin(async { true })));
        let call = ToolCall { id: "1".into(), name: "time".into(), args: json!({}) };
        let (out, _audit) = router.dispatch("s1", call).await;
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn execution_exceeding_timeout_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let permissions = PermissionManager::from_config(&ToolsConfig::default());
        let router = ToolRouter::new(registry, permissions, Duration::from_millis(5), Duration::from_secs(5));
        let call = ToolCall { id: "1".into(), name: "time".into(), args: json!({}) };
        let (out, _audit) = router.dispatch("s1", call).await;
        assert!(out.is_error);
        assert!(out.content.contains("timed out"));
    }
}
