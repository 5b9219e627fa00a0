// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::guard::{Guard, GuardOutcome};

const STOPWORDS: &[&str] = &["the", "a", "an", "and", "or", "but", "of", "to", "in", "is", "are"];
const OVERCONFIDENT_PHRASES: &[&str] = &["definitely", "guaranteed", "100% certain", "without a doubt"];
const UNCERTAIN_TOPIC_CUES: &[&str] = &["medical", "legal", "diagnosis", "investment", "prognosis"];

static TRAILING_PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;:-]\s*$").unwrap());

/// Checks the quality of an LLM reply before it is delivered: rejects
/// empty/near-empty replies, and warns on repetitive phrasing, dangling
/// trailing punctuation, or overconfident claims about an uncertain topic.
pub struct ResponseQualityGuard;

impl Guard for ResponseQualityGuard {
    fn name(&self) -> &str {
        "response_quality"
    }

    fn check(&self, text: &str) -> anyhow::Result<GuardOutcome> {
        let trimmed = text.trim();
        if trimmed.len() < 5 {
            return Ok(GuardOutcome::block("reply is empty or too short"));
        }

        if let Some(trigram) = dominant_repeated_trigram(trimmed) {
            return Ok(GuardOutcome::warn(format!("reply repeats the phrase \"{trigram}\" excessively")));
        }

        let incomplete = TRAILING_PUNCTUATION.is_match(trimmed)
            || trimmed
                .split_whitespace()
                .last()
                .map(|w| STOPWORDS.contains(&w.to_lowercase().as_str()))
                .unwrap_or(false);
        if incomplete {
            return Ok(GuardOutcome::warn("reply appears to end mid-thought"));
        }

        let lower = trimmed.to_lowercase();
        let overconfident = OVERCONFIDENT_PHRASES.iter().any(|p| lower.contains(p));
        let uncertain_topic = UNCERTAIN_TOPIC_CUES.iter().any(|c| lower.contains(c));
        if overconfident && uncertain_topic {
            return Ok(GuardOutcome::warn("overconfident language used on an uncertain topic"));
        }

        Ok(GuardOutcome::pass())
    }
}

/// Finds a 3-word sequence that appears at least 3 times and makes up more
/// than 10% of all trigrams in the text, if any.
fn dominant_repeated_trigram(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 3 {
        return None;
    }
    let mut counts: HashMap<String, u32> = HashMap::new();
    for window in words.windows(3) {
        *counts.entry(window.join(" ").to_lowercase()).or_insert(0) += 1;
    }
    let total = (words.len() - 2) as f32;
    counts
        .into_iter()
        .find(|(_, count)| *count >= 3 && (*count as f32 / total) > 0.1)
        .map(|(trigram, _)| trigram)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> GuardOutcome {
        ResponseQualityGuard.check(text).unwrap()
    }

    #[test]
    fn empty_reply_is_blocked() {
        assert!(!check("").passed);
    }

    #[test]
    fn very_short_reply_is_blocked() {
        assert!(!check("ok.").passed);
    }

    #[test]
    fn repetitive_phrase_warns() {
        let text = "I think so. I think so. I think so. I think so.";
        let outcome = check(text);
        assert!(!outcome.passed);
        assert_eq!(outcome.severity, crate::guard::Severity::Warn);
    }

    #[test]
    fn dangling_trailing_punctuation_warns() {
        let outcome = check("Here is the answer and also,");
        assert!(!outcome.passed);
    }

    #[test]
    fn overconfident_language_on_uncertain_topic_warns() {
        let outcome = check("You definitely have this medical condition.");
        assert!(!outcome.passed);
    }

    #[test]
    fn normal_reply_passes() {
        assert!(check("The capital of France is Paris.").passed);
    }
}
