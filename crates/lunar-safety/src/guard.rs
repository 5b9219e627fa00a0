// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Block,
}

#[derive(Debug, Clone)]
pub struct GuardOutcome {
    pub passed: bool,
    pub severity: Severity,
    pub reason: Option<String>,
    pub metadata: Value,
}

impl GuardOutcome {
    pub fn pass() -> Self {
        Self { passed: true, severity: Severity::Info, reason: None, metadata: Value::Null }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self { passed: false, severity: Severity::Block, reason: Some(reason.into()), metadata: Value::Null }
    }

    pub fn warn(reason: impl Into<String>) -> Self {
        Self { passed: false, severity: Severity::Warn, reason: Some(reason.into()), metadata: Value::Null }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A single named check in a safety pipeline.
pub trait Guard: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, text: &str) -> anyhow::Result<GuardOutcome>;
}

/// One entry in a completed pipeline run.
#[derive(Debug, Clone)]
pub struct GuardReport {
    pub guard: String,
    pub outcome: GuardOutcome,
}

/// Result of running a full [`GuardPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub reports: Vec<GuardReport>,
}

/// An ordered list of guards, run in declaration order. The first guard
/// that reports `severity = Block` terminates the run; `warn`/`info`
/// outcomes accumulate without stopping evaluation.
pub struct GuardPipeline {
    guards: Vec<Box<dyn Guard>>,
}

impl GuardPipeline {
    pub fn new() -> Self {
        Self { guards: Vec::new() }
    }

    pub fn push(mut self, guard: Box<dyn Guard>) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn run(&self, text: &str) -> PipelineResult {
        let mut reports = Vec::new();
        for guard in &self.guards {
            let outcome = match guard.check(text) {
                Ok(o) => o,
                Err(e) => {
                    warn!(guard = guard.name(), error = %e, "guard errored, treating as warn");
                    GuardOutcome::warn(format!("{} errored: {e}", guard.name()))
                }
            };
            let blocked = !outcome.passed && outcome.severity == Severity::Block;
            let reason = outcome.reason.clone();
            reports.push(GuardReport { guard: guard.name().to_string(), outcome });
            if blocked {
                return PipelineResult { blocked: true, block_reason: reason, reports };
            }
        }
        PipelineResult { blocked: false, block_reason: None, reports }
    }
}

impl Default for GuardPipeline {
    fn default() -> Self {
        Self::new()
    }
}
