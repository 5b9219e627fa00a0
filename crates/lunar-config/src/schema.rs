// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    /// External tool-protocol servers this runtime connects to as a client.
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier: "openai" (OpenAI-compatible wire format, also used
    /// for Ollama/local servers) or "mock".
    pub provider: String,
    pub name: String,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Path to YAML mock-responses file (used when provider = "mock").
    pub mock_responses_file: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o-mini".into(),
            api_key_env: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
            mock_responses_file: None,
        }
    }
}

fn default_max_iterations() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Identifier used in the sessionId ("agent:{agentId}:{provider}:{peerId}").
    #[serde(default = "default_agent_id")]
    pub agent_id: String,
    /// Maximum LLM-call rounds in a single agent-loop invocation.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// System prompt override; leave None to use the built-in prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_agent_id() -> String {
    "default".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
            max_iterations: default_max_iterations(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Timeout in seconds for arbitrary shell execution tools.
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
    /// Timeout in seconds for every other tool.
    #[serde(default = "default_tool_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Directories the `read_file`/`list_directory`/shell tools may touch.
    #[serde(default = "default_allowed_paths")]
    pub allowed_paths: Vec<String>,
    /// Approval-threshold risk level below which the approval callback
    /// auto-approves without asking an operator ("low", "medium", "high",
    /// or "none" to require explicit approval for everything).
    #[serde(default = "default_auto_approve_risk")]
    pub auto_approve_up_to_risk: String,
}

fn default_shell_timeout_secs() -> u64 {
    10
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_allowed_paths() -> Vec<String> {
    vec![".".into()]
}
fn default_auto_approve_risk() -> String {
    "low".into()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout_secs(),
            default_timeout_secs: default_tool_timeout_secs(),
            allowed_paths: default_allowed_paths(),
            auto_approve_up_to_risk: default_auto_approve_risk(),
        }
    }
}

fn default_embedding_dim() -> usize {
    768
}
fn default_chunk_word_budget() -> usize {
    400
}
fn default_chunk_overlap_words() -> usize {
    80
}
fn default_vector_weight() -> f32 {
    0.7
}
fn default_bm25_weight() -> f32 {
    0.3
}
fn default_candidate_multiplier() -> usize {
    3
}
fn default_search_limit() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path to the SQLite index database (default: $LUNAR_DATA/memory.db).
    pub index_path: Option<String>,
    /// Root directory containing MEMORY.md and memory/*.md.
    pub memory_dir: Option<String>,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_chunk_word_budget")]
    pub chunk_word_budget: usize,
    #[serde(default = "default_chunk_overlap_words")]
    pub chunk_overlap_words: usize,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    #[serde(default = "default_bm25_weight")]
    pub bm25_weight: f32,
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            memory_dir: None,
            embedding_dim: default_embedding_dim(),
            chunk_word_budget: default_chunk_word_budget(),
            chunk_overlap_words: default_chunk_overlap_words(),
            vector_weight: default_vector_weight(),
            bm25_weight: default_bm25_weight(),
            candidate_multiplier: default_candidate_multiplier(),
            search_limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_true")]
    pub prompt_injection: bool,
    #[serde(default = "default_true")]
    pub content_filter: bool,
    #[serde(default = "default_true")]
    pub pii_detector: bool,
    #[serde(default = "default_true")]
    pub response_quality: bool,
    #[serde(default = "default_true")]
    pub output_content: bool,
    #[serde(default = "default_true")]
    pub prompt_leak: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            prompt_injection: true,
            content_filter: true,
            pii_detector: true,
            response_quality: true,
            output_content: true,
            prompt_leak: true,
        }
    }
}

fn default_port() -> u16 {
    8787
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token_env: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    #[default]
    Stdio,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    #[serde(default)]
    pub transport: McpTransport,
    /// Subprocess command (stdio transport). `${VAR}` placeholders in
    /// `args`/`env` values are resolved against the process environment.
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Base URL (http transport).
    pub url: Option<String>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_model_provider_is_openai() {
        let c = Config::default();
        assert_eq!(c.model.provider, "openai");
    }

    #[test]
    fn config_default_max_iterations_is_ten() {
        let c = Config::default();
        assert_eq!(c.agent.max_iterations, 10);
    }

    #[test]
    fn config_default_hybrid_weights_sum_to_one() {
        let c = Config::default();
        assert!((c.memory.vector_weight + c.memory.bm25_weight - 1.0).abs() < 1e-6);
    }

    #[test]
    fn config_default_safety_all_enabled() {
        let c = Config::default();
        assert!(c.safety.prompt_injection);
        assert!(c.safety.pii_detector);
        assert!(c.safety.output_content);
    }

    #[test]
    fn config_deserialises_from_yaml() {
        let yaml_str = "model:\n  provider: openai\n  name: llama3.2\n  base_url: http://localhost:11434/v1\n";
        let c: Config = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(c.model.name, "llama3.2");
        assert_eq!(c.model.base_url.as_deref(), Some("http://localhost:11434/v1"));
    }

    #[test]
    fn config_mcp_servers_parse() {
        let yaml_str = r#"
mcp_servers:
  weather:
    transport: stdio
    command: weather-mcp
    args: ["--token", "${WEATHER_TOKEN}"]
"#;
        let c: Config = serde_yaml::from_str(yaml_str).unwrap();
        let s = c.mcp_servers.get("weather").unwrap();
        assert_eq!(s.command.as_deref(), Some("weather-mcp"));
        assert_eq!(s.args[1], "${WEATHER_TOKEN}");
    }

    #[test]
    fn config_partial_yaml_fills_in_defaults() {
        let yaml_str = "model:\n  name: gpt-4o-mini\n  provider: openai\n";
        let c: Config = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(c.agent.max_iterations, AgentConfig::default().max_iterations);
    }
}
