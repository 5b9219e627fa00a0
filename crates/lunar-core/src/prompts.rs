// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! System prompt construction.

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful personal assistant with access to a durable memory and a \
small set of tools. Use the memory_search tool to recall prior context \
before claiming you don't know something the user may have told you \
before. Use memory_write to save facts worth remembering for later. Keep \
replies concise and direct.";

/// Builds the system prompt for a session: the configured override if
/// present, otherwise the built-in default.
pub fn system_prompt(override_prompt: Option<&str>) -> String {
    override_prompt.map(str::to_string).unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_default_prompt_when_no_override() {
        let prompt = system_prompt(None);
        assert_eq!(prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn uses_override_verbatim_when_present() {
        let prompt = system_prompt(Some("be terse"));
        assert_eq!(prompt, "be terse");
    }
}
