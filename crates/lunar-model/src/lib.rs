// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub(crate) mod openai_compat;
mod mock;
mod provider;
mod types;

pub use mock::{MockProvider, ScriptedMockProvider};
pub use provider::{ModelProvider, ResponseStream};
pub use types::*;

use openai_compat::{AuthStyle, OpenAICompatProvider};
use lunar_config::ModelConfig;

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// Only two providers exist: "openai" (the generic OpenAI-compatible wire
/// format, used for both hosted APIs and local servers reached via
/// `base_url`) and "mock" (deterministic, for tests and offline use).
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "openai" => {
            let api_key = cfg
                .api_key_env
                .as_deref()
                .map(std::env::var)
                .transpose()
                .ok()
                .flatten();
            let base_url = cfg.base_url.as_deref().unwrap_or("https://api.openai.com/v1");
            let auth_style = if api_key.is_some() { AuthStyle::Bearer } else { AuthStyle::None };
            Ok(Box::new(OpenAICompatProvider::new(
                "openai",
                cfg.name.clone(),
                api_key,
                base_url,
                cfg.max_tokens,
                cfg.temperature,
                auth_style,
            )))
        }
        "mock" => Ok(Box::new(MockProvider::new(cfg.name.clone()))),
        other => anyhow::bail!("unknown model provider: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ModelConfig {
        ModelConfig {
            provider: "openai".into(),
            name: "gpt-4o-mini".into(),
            api_key_env: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
            mock_responses_file: None,
        }
    }

    #[test]
    fn from_config_builds_openai_provider() {
        let cfg = base_config();
        let provider = from_config(&cfg).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn from_config_builds_openai_provider_with_custom_base_url() {
        let mut cfg = base_config();
        cfg.base_url = Some("http://localhost:11434/v1".into());
        cfg.name = "llama3.2".into();
        let provider = from_config(&cfg).unwrap();
        assert_eq!(provider.model_name(), "llama3.2");
    }

    #[test]
    fn from_config_builds_mock_provider() {
        let mut cfg = base_config();
        cfg.provider = "mock".into();
        let provider = from_config(&cfg).unwrap();
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn from_config_rejects_unknown_provider() {
        let mut cfg = base_config();
        cfg.provider = "carrier-pigeon".into();
        assert!(from_config(&cfg).is_err());
    }
}
