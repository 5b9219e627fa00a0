// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use once_cell::sync::Lazy;
use regex::Regex;

use crate::guard::{Guard, GuardOutcome};

static BLOCK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)how (do|can) i (make|build|synthesize) a (bomb|explosive)",
        r"(?i)how to (kill|murder) (someone|a person)",
        r"(?i)instructions? (for|to) (commit|commiting) suicide",
        r"(?i)how (do|can) i (hurt|harm) myself",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern compiles"))
    .collect()
});

static WARN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)\b(password|api[ _-]?key|secret key)\b", r"(?i)\bexploit\b.*\bvulnerability\b"]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern compiles"))
        .collect()
});

pub struct ContentFilterGuard;

impl Guard for ContentFilterGuard {
    fn name(&self) -> &str {
        "content_filter"
    }

    fn check(&self, text: &str) -> anyhow::Result<GuardOutcome> {
        for re in BLOCK_PATTERNS.iter() {
            if re.is_match(text) {
                return Ok(GuardOutcome::block("content matches a disallowed violence/self-harm/illegal pattern"));
            }
        }
        for re in WARN_PATTERNS.iter() {
            if re.is_match(text) {
                return Ok(GuardOutcome::warn("content discusses credentials/security topics"));
            }
        }
        Ok(GuardOutcome::pass())
    }
}
