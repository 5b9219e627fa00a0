// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channel::{BoxFuture, Channel, ChatType, Envelope, InboundHandler};

pub const SLASH_COMMANDS: &[&str] = &["/temp", "/model", "/history", "/clear", "/system", "/help", "/tools", "/sessions"];

const HELP_TEXT: &str = "\
Commands:
  /temp <value>   set sampling temperature
  /model <name>   switch model
  /history        show recent turns
  /clear          clear the current session
  /system <text>  set a session system prompt override
  /tools          list available tools
  /sessions       list known sessions
  /help           show this message
  exit            quit";

/// Handles a recognized slash command (minus the leading slash) and its
/// remaining argument text, returning the text to print. Slash commands
/// never reach the agent loop.
pub type SlashCommandHandler = Arc<dyn Fn(&str, &str) -> BoxFuture<'static, String> + Send + Sync>;

/// Local terminal connector: reads lines from stdin, dispatches recognized
/// slash commands to an injected handler, and forwards everything else to
/// the agent loop as an [`Envelope`].
pub struct CliChannel {
    peer_id: String,
    running: Arc<AtomicBool>,
    slash_handler: Option<SlashCommandHandler>,
}

impl CliChannel {
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self { peer_id: peer_id.into(), running: Arc::new(AtomicBool::new(false)), slash_handler: None }
    }

    pub fn with_slash_handler(mut self, handler: SlashCommandHandler) -> Self {
        self.slash_handler = Some(handler);
        self
    }

    /// Parses a line into `(command, rest)` if it is a recognized slash
    /// command, e.g. `"/model gpt-4o-mini"` -> `("model", "gpt-4o-mini")`.
    pub fn parse_slash_command(line: &str) -> Option<(&str, &str)> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }
        let cmd_word = line.split_whitespace().next().unwrap_or(line);
        if !SLASH_COMMANDS.contains(&cmd_word) {
            return None;
        }
        let command = cmd_word.trim_start_matches('/');
        let rest = line[cmd_word.len()..].trim();
        Some((command, rest))
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self, on_message: InboundHandler) -> anyhow::Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        println!("{HELP_TEXT}");
        while self.running.load(Ordering::SeqCst) {
            print!("> ");
            use std::io::Write;
            std::io::stdout().flush().ok();

            let Some(line) = lines.next_line().await? else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" {
                break;
            }

            if let Some((command, rest)) = Self::parse_slash_command(line) {
                if command == "help" {
                    println!("{HELP_TEXT}");
                    continue;
                }
                if let Some(handler) = &self.slash_handler {
                    println!("{}", handler(command, rest).await);
                } else {
                    println!("(no handler registered for /{command})");
                }
                continue;
            }

            let envelope = Envelope::new("cli", self.peer_id.clone(), line, ChatType::Direct);
            match on_message(envelope).await {
                Ok(reply) => println!("{reply}"),
                Err(e) => println!("error: {e}"),
            }
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slash_command_with_argument() {
        let (cmd, rest) = CliChannel::parse_slash_command("/model gpt-4o-mini").unwrap();
        assert_eq!(cmd, "model");
        assert_eq!(rest, "gpt-4o-mini");
    }

    #[test]
    fn parses_bare_slash_command() {
        let (cmd, rest) = CliChannel::parse_slash_command("/clear").unwrap();
        assert_eq!(cmd, "clear");
        assert_eq!(rest, "");
    }

    #[test]
    fn unrecognized_slash_word_is_not_a_command() {
        assert!(CliChannel::parse_slash_command("/nonsense").is_none());
    }

    #[test]
    fn plain_text_is_not_a_slash_command() {
        assert!(CliChannel::parse_slash_command("hello there").is_none());
    }
}
