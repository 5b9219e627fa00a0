// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Ordered input/output safety pipeline.
//!
//! An input pipeline runs before the agent loop ever sees a user message; an
//! output pipeline runs on the proposed reply before it is delivered. Each
//! is a [`GuardPipeline`] of [`Guard`]s that short-circuits on the first
//! `block`-severity result.

mod guard;
pub mod guards;

pub use guard::{Guard, GuardOutcome, GuardPipeline, GuardReport, PipelineResult, Severity};

use lunar_config::SafetyConfig;

/// A safe, generic fallback reply sent in place of anything a guard blocks.
pub const SAFE_FALLBACK: &str = "I can't help with that request.";

/// Builds the input pipeline (prompt-injection, content filter, PII) from
/// configuration, honoring each guard's individual enable flag.
pub fn input_pipeline(cfg: &SafetyConfig) -> GuardPipeline {
    let mut pipeline = GuardPipeline::new();
    if cfg.prompt_injection {
        pipeline = pipeline.push(Box::new(guards::PromptInjectionGuard));
    }
    if cfg.content_filter {
        pipeline = pipeline.push(Box::new(guards::ContentFilterGuard));
    }
    if cfg.pii_detector {
        pipeline = pipeline.push(Box::new(guards::PiiGuard));
    }
    pipeline
}

/// Builds the output pipeline (response quality, destructive-content,
/// PII, prompt-leak) from configuration and the active system prompt.
pub fn output_pipeline(cfg: &SafetyConfig, system_prompt: &str) -> GuardPipeline {
    let mut pipeline = GuardPipeline::new();
    if cfg.response_quality {
        pipeline = pipeline.push(Box::new(guards::ResponseQualityGuard));
    }
    if cfg.output_content {
        pipeline = pipeline.push(Box::new(guards::OutputContentGuard));
    }
    if cfg.pii_detector {
        pipeline = pipeline.push(Box::new(guards::PiiGuard));
    }
    if cfg.prompt_leak {
        pipeline = pipeline.push(Box::new(guards::PromptLeakGuard::new(system_prompt)));
    }
    pipeline
}
