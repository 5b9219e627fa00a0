// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = lunar_config::load(cli.config.as_deref())?;
            lunar_gateway::run(config, &cli.data_dir).await
        }
        Commands::McpServe => {
            let config = lunar_config::load(cli.config.as_deref())?;
            std::fs::create_dir_all(&cli.data_dir)?;
            let memory = Arc::new(lunar_memory::MemoryStore::open(config.memory.clone(), &cli.data_dir)?);
            memory.index_all().await?;
            let mut registry = lunar_tools::ToolRegistry::new();
            lunar_tools::register_builtins(&mut registry, memory);
            lunar_mcp::serve_stdio(Arc::new(registry)).await
        }
        Commands::ShowConfig => {
            let config = lunar_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Completions { shell } => {
            cli::print_completions(shell);
            Ok(())
        }
    }
}

/// Sets up `tracing` output to stderr. Quiet by default (warnings and
/// errors only); `-v` raises the default level to debug. `RUST_LOG` always
/// takes precedence when set.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
