// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use once_cell::sync::Lazy;
use regex::Regex;

use crate::guard::{Guard, GuardOutcome};

static DIRECT_LEAK: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)my instructions (say|state|are)", r"(?i)as (an AI|a language model) i (was|am) (told|instructed) to"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

/// Blocks replies that directly claim to quote the system prompt, or that
/// reproduce at least 3 distinct fragments of the configured system prompt.
pub struct PromptLeakGuard {
    system_prompt_fragments: Vec<String>,
}

impl PromptLeakGuard {
    /// Splits the system prompt into line-level fragments to compare
    /// against, ignoring very short lines that would produce noisy matches.
    pub fn new(system_prompt: &str) -> Self {
        let fragments = system_prompt
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| l.len() >= 20)
            .collect();
        Self { system_prompt_fragments: fragments }
    }
}

impl Guard for PromptLeakGuard {
    fn name(&self) -> &str {
        "prompt_leak"
    }

    fn check(&self, text: &str) -> anyhow::Result<GuardOutcome> {
        for re in DIRECT_LEAK.iter() {
            if re.is_match(text) {
                return Ok(GuardOutcome::block("reply directly references its own instructions"));
            }
        }
        let matches = self.system_prompt_fragments.iter().filter(|f| text.contains(f.as_str())).count();
        if matches >= 3 {
            return Ok(GuardOutcome::block("reply reproduces multiple fragments of the system prompt"));
        }
        Ok(GuardOutcome::pass())
    }
}
