// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Gateway startup — assembles every subsystem and starts the HTTP server.
//!
//! # Startup sequence
//!
//! [`run`] constructs subsystems leaves-first so nothing depends on a
//! partially-built neighbor: index -> files -> indexer -> tools -> router ->
//! agent -> channels, then starts a background re-index poll, the
//! configured channel connectors, and finally the Axum HTTP server (blocks
//! until shutdown).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use lunar_channels::{Channel, CliChannel, Envelope, InboundHandler, TelegramChannel};
use lunar_config::Config;
use lunar_core::Agent;
use lunar_mcp::McpClientManager;
use lunar_memory::MemoryStore;
use lunar_metrics::MetricsRegistry;
use lunar_tools::{PermissionManager, ToolRegistry, ToolRouter};
use lunar_transcript::TranscriptStore;

use crate::http::AppState;

/// How often the background task re-indexes markdown files that changed
/// since the last pass.
const REINDEX_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Builds every subsystem and returns the shared [`AppState`] plus the list
/// of channel connectors to start, without starting the HTTP server. Split
/// out from [`run`] so tests can build the state without binding a port.
pub async fn build(cfg: Config, data_dir: &Path) -> anyhow::Result<(AppState, Vec<Arc<dyn Channel>>)> {
    std::fs::create_dir_all(data_dir)?;

    let memory = Arc::new(MemoryStore::open(cfg.memory.clone(), data_dir)?);
    let indexed = memory.index_all().await?;
    info!(chunks = indexed, "indexed markdown memory tree");

    let mut registry = ToolRegistry::new();
    lunar_tools::register_builtins(&mut registry, memory.clone());
    let mut permissions = PermissionManager::from_config(&cfg.tools);

    let mcp = Arc::new(McpClientManager::connect(&cfg.mcp_servers).await);
    for schema in mcp.tool_schemas() {
        permissions.register_remote_default(&schema.name);
    }

    let router = ToolRouter::new(registry, permissions, Duration::from_secs(cfg.tools.default_timeout_secs), Duration::from_secs(cfg.tools.shell_timeout_secs))
        .with_remote_manager(mcp);

    let transcript = Arc::new(TranscriptStore::new(data_dir));
    let model = lunar_model::from_config(&cfg.model)?;
    let metrics = Arc::new(MetricsRegistry::new());

    let agent = Arc::new(Agent::new(model, router, transcript, &cfg).with_metrics(metrics.clone()));

    tokio::spawn(reindex_loop(memory));

    let mut channels: Vec<Arc<dyn Channel>> = vec![Arc::new(CliChannel::new("local"))];
    if let Some(telegram) = &cfg.channels.telegram {
        if telegram.enabled {
            match std::env::var(&telegram.bot_token_env) {
                Ok(token) => channels.push(Arc::new(TelegramChannel::new(token))),
                Err(_) => warn!(env = %telegram.bot_token_env, "Telegram enabled but bot token env var is unset, skipping"),
            }
        }
    }

    Ok((AppState { agent, metrics }, channels))
}

/// Starts the gateway: builds every subsystem, starts the configured
/// channel connectors, and serves the HTTP API until shutdown.
pub async fn run(cfg: Config, data_dir: &Path) -> anyhow::Result<()> {
    let bind = format!("{}:{}", cfg.gateway.host, cfg.gateway.port);
    let (state, channels) = build(cfg, data_dir).await?;

    for channel in channels {
        let agent = state.agent.clone();
        let handler: InboundHandler = Arc::new(move |envelope: Envelope| {
            let agent = agent.clone();
            Box::pin(async move { agent.handle_message(&envelope).await })
        });
        let name = channel.name().to_string();
        tokio::spawn(async move {
            if let Err(err) = channel.start(handler).await {
                warn!(channel = %name, error = %err, "channel connector stopped");
            }
        });
    }

    info!(%bind, "starting HTTP gateway");
    let app = crate::http::router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn reindex_loop(memory: Arc<MemoryStore>) {
    let mut interval = tokio::time::interval(REINDEX_POLL_INTERVAL);
    loop {
        interval.tick().await;
        match memory.index_changed().await {
            Ok(0) => {}
            Ok(n) => info!(chunks = n, "re-indexed changed memory files"),
            Err(err) => warn!(error = %err, "memory re-index pass failed"),
        }
    }
}
