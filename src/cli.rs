// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

#[derive(Parser, Debug)]
#[command(
    name = "lunar",
    about = "Self-hosted conversational AI agent platform",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file (overrides auto-discovery).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Directory for transcripts, the memory index, and other runtime data.
    #[arg(long, env = "LUNAR_DATA", default_value = ".lunar/data")]
    pub data_dir: PathBuf,

    /// Verbose logging to stderr (default: errors only).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway: HTTP/WebSocket endpoints plus the configured
    /// channel connectors (Telegram, local CLI). This is the default when
    /// no subcommand is given.
    Serve,

    /// Expose the built-in tool set over stdio as an MCP server, so another
    /// MCP-compatible host can call them.
    McpServe,

    /// Print the merged configuration and exit.
    ShowConfig,

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
