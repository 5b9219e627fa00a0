// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use once_cell::sync::Lazy;
use regex::Regex;

use crate::guard::{Guard, GuardOutcome};

static DESTRUCTIVE_SHELL: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)rm\s+-rf\s+/(\s|$)", r"(?i)rm\s+-rf\s+/\*", r"(?i):\(\)\s*\{\s*:\|:&\s*\}\s*;"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static DESTRUCTIVE_SQL: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)\bdrop\s+(table|database)\b", r"(?i)\bdelete\s+from\s+\w+\s*;?\s*$", r"(?i)\btruncate\s+table\b"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static CODE_EXEC: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\beval\s*\(", r"\bexec\s*\(", r"__import__\s*\(", r"Runtime\.getRuntime\s*\("]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

/// Blocks LLM replies that contain destructive shell commands, destructive
/// SQL, or code-execution primitives — content that would be unsafe to
/// deliver verbatim to a user regardless of conversational context.
pub struct OutputContentGuard;

impl Guard for OutputContentGuard {
    fn name(&self) -> &str {
        "output_content"
    }

    fn check(&self, text: &str) -> anyhow::Result<GuardOutcome> {
        for re in DESTRUCTIVE_SHELL.iter().chain(DESTRUCTIVE_SQL.iter()).chain(CODE_EXEC.iter()) {
            if re.is_match(text) {
                return Ok(GuardOutcome::block("reply contains a destructive or code-execution pattern"));
            }
        }
        Ok(GuardOutcome::pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> GuardOutcome {
        OutputContentGuard.check(text).unwrap()
    }

    #[test]
    fn blocks_rm_rf_root() {
        assert!(!check("run `rm -rf /` to clean up").passed);
    }

    #[test]
    fn blocks_drop_table() {
        assert!(!check("DROP TABLE users;").passed);
    }

    #[test]
    fn blocks_eval_call() {
        assert!(!check("eval(user_input)").passed);
    }

    #[test]
    fn passes_benign_code_sample() {
        assert!(check("fn main() { println!(\"hi\"); }").passed);
    }
}
