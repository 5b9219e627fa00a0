// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod permission;
pub mod registry;
pub mod router;
pub mod tool;

pub use permission::{Decision, Permission, PermissionLevel, PermissionManager, RiskLevel};
pub use registry::{ToolRegistry, ToolSchema};
pub use router::{ApprovalCallback, ApprovalRequest, AuditEntry, RemoteToolManager, ToolRouter};
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput};

use std::sync::Arc;

use lunar_config::Config;
use lunar_memory::MemoryStore;

/// Registers every builtin tool against a fresh [`ToolRegistry`].
pub fn register_builtins(registry: &mut ToolRegistry, memory: Arc<MemoryStore>) {
    registry.register(builtin::TimeTool);
    registry.register(builtin::CalculatorTool);
    registry.register(builtin::ReadFileTool);
    registry.register(builtin::ListDirTool);
    registry.register(builtin::BashTool::default());
    registry.register(builtin::MemorySearchTool::new(memory.clone()));
    registry.register(builtin::MemoryWriteTool::new(memory));
}

/// Builds a fully-wired [`ToolRouter`] from configuration and a shared
/// memory store, with every builtin tool and its default permission
/// registered.
pub fn build_router(cfg: &Config, memory: Arc<MemoryStore>) -> ToolRouter {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry, memory);

    let permissions = PermissionManager::from_config(&cfg.tools);

    ToolRouter::new(
        registry,
        permissions,
        std::time::Duration::from_secs(cfg.tools.default_timeout_secs),
        std::time::Duration::from_secs(cfg.tools.shell_timeout_secs),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_config::MemoryConfig;
    use lunar_memory::HashEmbedder;
    use tempfile::tempdir;

    #[test]
    fn register_builtins_populates_all_seven_tools() {
        let dir = tempdir().unwrap();
        let cfg = MemoryConfig { embedding_dim: 16, ..MemoryConfig::default() };
        let store = Arc::new(MemoryStore::open_with_embedder(cfg, dir.path(), Arc::new(HashEmbedder::new(16))).unwrap());
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry, store);
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["bash", "calculator", "list_dir", "memory_search", "memory_write", "read_file", "time"]);
    }

    #[test]
    fn build_router_exposes_schemas_for_every_builtin() {
        let dir = tempdir().unwrap();
        let cfg = Config::default();
        let memory_cfg = MemoryConfig { embedding_dim: 16, ..MemoryConfig::default() };
        let store = Arc::new(MemoryStore::open_with_embedder(memory_cfg, dir.path(), Arc::new(HashEmbedder::new(16))).unwrap());
        let router = build_router(&cfg, store);
        assert_eq!(router.schemas().len(), 7);
    }
}
