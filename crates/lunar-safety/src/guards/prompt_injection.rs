// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use once_cell::sync::Lazy;
use regex::Regex;

use crate::guard::{Guard, GuardOutcome};

/// Direct attack shapes: instruction override, role reassignment, memory
/// wipe, system-prompt extraction attempts.
static BLOCK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)ignore (all |the )?(previous|prior|above) instructions",
        r"(?i)disregard (all |the )?(previous|prior|above) (instructions|rules)",
        r"(?i)you are now (a|an) ",
        r"(?i)forget (everything|all) (you('ve| have))? (learned|been told)",
        r"(?i)reveal (your |the )?(system prompt|instructions)",
        r"(?i)what (is|are) your (system prompt|instructions)",
        r"(?i)act as (if you (are|were)|a) (dan|jailbreak)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern compiles"))
    .collect()
});

/// Hidden zero-width/control characters used to smuggle instructions.
static ZERO_WIDTH: Lazy<Regex> = Lazy::new(|| Regex::new("[\u{200B}\u{200C}\u{200D}\u{FEFF}]").expect("static pattern compiles"));

pub struct PromptInjectionGuard;

impl Guard for PromptInjectionGuard {
    fn name(&self) -> &str {
        "prompt_injection"
    }

    fn check(&self, text: &str) -> anyhow::Result<GuardOutcome> {
        for re in BLOCK_PATTERNS.iter() {
            if re.is_match(text) {
                return Ok(GuardOutcome::block("possible prompt injection detected"));
            }
        }
        if ZERO_WIDTH.is_match(text) {
            return Ok(GuardOutcome::warn("hidden zero-width characters detected"));
        }
        Ok(GuardOutcome::pass())
    }
}
