// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-tool permission records and the approval decision they produce for a
//! given call.

use std::collections::HashMap;
use std::sync::Mutex;

use lunar_config::ToolsConfig;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionLevel {
    Read,
    Write,
    Execute,
}

#[derive(Debug, Clone)]
pub struct Permission {
    pub tool_name: String,
    pub level: PermissionLevel,
    pub requires_approval: bool,
    pub allowed_paths: Vec<String>,
    pub allowed_commands: Vec<String>,
    pub max_executions: Option<u32>,
    pub description: String,
    pub risk: RiskLevel,
}

impl Permission {
    pub fn auto(tool_name: impl Into<String>, level: PermissionLevel, risk: RiskLevel, description: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            level,
            requires_approval: false,
            allowed_paths: Vec::new(),
            allowed_commands: Vec::new(),
            max_executions: None,
            description: description.into(),
            risk,
        }
    }

    pub fn approval_required(tool_name: impl Into<String>, level: PermissionLevel, risk: RiskLevel, description: impl Into<String>) -> Self {
        Self { requires_approval: true, ..Self::auto(tool_name, level, risk, description) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow,
    RequiresApproval(RiskLevel),
    Deny(String),
}

/// Holds the registered [`Permission`] for every known tool, plus per-session
/// execution counters, and decides what happens when a call comes in.
pub struct PermissionManager {
    permissions: HashMap<String, Permission>,
    auto_approve_up_to: RiskLevel,
    counters: Mutex<HashMap<(String, String), u32>>,
}

const SHELL_METACHARACTERS: &[&str] = &[";", "|", "`", "$(", "&&", "||"];

impl PermissionManager {
    pub fn new(auto_approve_up_to: RiskLevel) -> Self {
        Self { permissions: HashMap::new(), auto_approve_up_to, counters: Mutex::new(HashMap::new()) }
    }

    pub fn from_config(cfg: &ToolsConfig) -> Self {
        let risk = RiskLevel::from_str(&cfg.auto_approve_up_to_risk).unwrap_or(RiskLevel::Low);
        let mut manager = Self::new(risk);
        manager.register_builtin_defaults(cfg);
        manager
    }

    /// The default permission table for Lunar's own builtin tools.
    fn register_builtin_defaults(&mut self, cfg: &ToolsConfig) {
        for name in ["time", "calculator", "memory_search", "read_file", "list_dir"] {
            self.register(Permission::auto(name, PermissionLevel::Read, RiskLevel::Low, format!("read-only builtin: {name}")));
        }
        self.register(Permission::approval_required(
            "memory_write",
            PermissionLevel::Write,
            RiskLevel::Medium,
            "appends a new entry to the markdown memory store",
        ));
        let mut bash = Permission::approval_required("bash", PermissionLevel::Execute, RiskLevel::High, "executes an arbitrary shell command");
        bash.allowed_paths = cfg.allowed_paths.clone();
        self.register(bash);
    }

    pub fn register(&mut self, permission: Permission) {
        self.permissions.insert(permission.tool_name.clone(), permission);
    }

    /// Registers the default policy for a remote (MCP-like) tool, inferred
    /// from its namespaced name's verb. Read-style verbs auto-approve,
    /// destructive verbs are denied outright, everything else asks.
    pub fn register_remote_default(&mut self, namespaced_name: &str) {
        let lower = namespaced_name.to_ascii_lowercase();
        const READ_VERBS: &[&str] = &["search", "list", "read", "get", "fetch"];
        const DESTRUCTIVE_VERBS: &[&str] = &["drop", "delete_repo", "truncate"];

        if DESTRUCTIVE_VERBS.iter().any(|v| lower.contains(v)) {
            self.register(Permission {
                requires_approval: true,
                ..Permission::approval_required(namespaced_name, PermissionLevel::Execute, RiskLevel::High, "destructive remote tool, denied by default")
            });
            // Destructive tools are denied outright by the dispatch logic in `decide`,
            // not merely gated behind approval; registering a permission still lets
            // callers introspect why.
            return;
        }
        if READ_VERBS.iter().any(|v| lower.contains(v)) {
            self.register(Permission::auto(namespaced_name, PermissionLevel::Read, RiskLevel::Low, "read-only remote tool"));
            return;
        }
        self.register(Permission::approval_required(namespaced_name, PermissionLevel::Execute, RiskLevel::Medium, "remote tool of unknown effect"));
    }

    fn is_destructive(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        ["drop", "delete_repo", "truncate"].iter().any(|v| lower.contains(v))
    }

    /// Six-step dispatch: unknown tool → deny; destructive remote verb →
    /// deny; execution quota → deny; path/command validation → deny;
    /// approval-required → RequiresApproval; else Allow.
    pub fn decide(&self, session_id: &str, tool_name: &str, args: &Value) -> Decision {
        let Some(permission) = self.permissions.get(tool_name) else {
            return Decision::Deny(format!("no permission registered for tool: {tool_name}"));
        };

        if Self::is_destructive(tool_name) {
            return Decision::Deny(format!("{tool_name} is a destructive operation and is never allowed"));
        }

        if let Some(max) = permission.max_executions {
            let counters = self.counters.lock().unwrap();
            let count = counters.get(&(session_id.to_string(), tool_name.to_string())).copied().unwrap_or(0);
            if count >= max {
                return Decision::Deny(format!("{tool_name} has exceeded its execution quota of {max} for this session"));
            }
        }

        if !permission.allowed_paths.is_empty() {
            if let Some(path) = args.get("path").and_then(|v| v.as_str()) {
                if path.contains("..") {
                    return Decision::Deny(format!("path traversal rejected: {path}"));
                }
                let allowed = permission.allowed_paths.iter().any(|root| path.starts_with(root.as_str()));
                if !allowed {
                    return Decision::Deny(format!("path not in allowed set: {path}"));
                }
            }
        }

        if !permission.allowed_commands.is_empty() {
            if let Some(command) = args.get("command").and_then(|v| v.as_str()) {
                if SHELL_METACHARACTERS.iter().any(|c| command.contains(c)) {
                    return Decision::Deny(format!("command contains disallowed shell metacharacters: {command}"));
                }
                let allowed = permission.allowed_commands.iter().any(|c| command.starts_with(c.as_str()));
                if !allowed {
                    return Decision::Deny(format!("command not in allowed set: {command}"));
                }
            }
        }

        if permission.requires_approval && permission.risk > self.auto_approve_up_to {
            return Decision::RequiresApproval(permission.risk);
        }

        Decision::Allow
    }

    /// Records that `tool_name` executed once for `session_id`, for quota
    /// enforcement. Call after a successful execution.
    pub fn record_execution(&self, session_id: &str, tool_name: &str) {
        let mut counters = self.counters.lock().unwrap();
        *counters.entry((session_id.to_string(), tool_name.to_string())).or_insert(0) += 1;
    }

    pub fn get(&self, tool_name: &str) -> Option<&Permission> {
        self.permissions.get(tool_name)
    }
}
