// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::guard::{Guard, GuardOutcome};

/// False-positive suppression: an SSN-shaped number preceded by one of these
/// words within a short window is almost always a version/port/id, not a
/// social security number.
const SSN_SUPPRESS_WORDS: &[&str] = &["version", "port", "id", "code", "zip"];

static SSN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static CREDIT_CARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}\b").unwrap());
static PASSWORD_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(password|api[ _-]?key)\b\s*(is|[:=])\s*\S+").unwrap());
static BANK_ACCOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(account|routing)\s*(number)?\s*(is|[:=])?\s*\d{6,}\b").unwrap());
static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[\w.+-]+@[\w-]+\.[\w.-]+\b").unwrap());
static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}[-.\s]\d{3}[-.\s]\d{4}\b").unwrap());
static IP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap());
static DOB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(born on|date of birth|dob)\b[^\d]{0,20}\d{1,2}[/-]\d{1,2}[/-]\d{2,4}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiSeverity {
    Critical,
    Sensitive,
}

#[derive(Debug, Clone)]
pub struct PiiFinding {
    pub family: &'static str,
    pub severity: PiiSeverity,
    pub matched: String,
}

fn window_before(text: &str, start: usize, len: usize) -> String {
    let from = start.saturating_sub(len);
    text.get(from..start).unwrap_or("").to_lowercase()
}

/// Finds every PII occurrence in `text`, applying the documented
/// false-positive suppressions (SSN adjacent to version/port/id/code/zip;
/// phone numbers with fewer than 10 digits).
pub fn find(text: &str) -> Vec<PiiFinding> {
    let mut findings = Vec::new();

    for m in SSN.find_iter(text) {
        let ctx = window_before(text, m.start(), 20);
        if SSN_SUPPRESS_WORDS.iter().any(|w| ctx.contains(w)) {
            continue;
        }
        findings.push(PiiFinding { family: "ssn", severity: PiiSeverity::Critical, matched: m.as_str().to_string() });
    }
    for m in CREDIT_CARD.find_iter(text) {
        findings.push(PiiFinding { family: "credit_card", severity: PiiSeverity::Critical, matched: m.as_str().to_string() });
    }
    for m in PASSWORD_MENTION.find_iter(text) {
        findings.push(PiiFinding { family: "credential", severity: PiiSeverity::Critical, matched: m.as_str().to_string() });
    }
    for m in BANK_ACCOUNT.find_iter(text) {
        findings.push(PiiFinding { family: "bank_account", severity: PiiSeverity::Critical, matched: m.as_str().to_string() });
    }
    for m in EMAIL.find_iter(text) {
        findings.push(PiiFinding { family: "email", severity: PiiSeverity::Sensitive, matched: m.as_str().to_string() });
    }
    for m in PHONE.find_iter(text) {
        let digits = m.as_str().chars().filter(|c| c.is_ascii_digit()).count();
        if digits < 10 {
            continue;
        }
        findings.push(PiiFinding { family: "phone", severity: PiiSeverity::Sensitive, matched: m.as_str().to_string() });
    }
    for m in IP.find_iter(text) {
        findings.push(PiiFinding { family: "ip", severity: PiiSeverity::Sensitive, matched: m.as_str().to_string() });
    }
    for m in DOB.find_iter(text) {
        findings.push(PiiFinding { family: "dob", severity: PiiSeverity::Sensitive, matched: m.as_str().to_string() });
    }
    findings
}

/// Replaces every recognized PII span with a stable, family-specific
/// placeholder. Redacting already-redacted text is a no-op.
pub fn redact(text: &str) -> String {
    let mut redacted = text.to_string();
    for finding in find(text) {
        let replacement = redact_one(&finding);
        redacted = redacted.replace(&finding.matched, &replacement);
    }
    redacted
}

fn redact_one(finding: &PiiFinding) -> String {
    match finding.family {
        "email" => {
            let (local, domain) = finding.matched.split_once('@').unwrap_or((&finding.matched, ""));
            let first = local.chars().next().unwrap_or('*');
            format!("{first}***@{domain}")
        }
        "credit_card" => {
            let digits: String = finding.matched.chars().filter(|c| c.is_ascii_digit()).collect();
            let last4 = &digits[digits.len().saturating_sub(4)..];
            format!("[CC-****{last4}]")
        }
        "ssn" => "[SSN-REDACTED]".to_string(),
        "phone" => {
            let digits: String = finding.matched.chars().filter(|c| c.is_ascii_digit()).collect();
            let last4 = &digits[digits.len().saturating_sub(4)..];
            format!("***-***-{last4}")
        }
        "ip" => "[IP-REDACTED]".to_string(),
        "dob" => "[DOB-REDACTED]".to_string(),
        "bank_account" => "[ACCOUNT-REDACTED]".to_string(),
        "credential" => "[CREDENTIAL-REDACTED]".to_string(),
        _ => "[REDACTED]".to_string(),
    }
}

pub struct PiiGuard;

impl Guard for PiiGuard {
    fn name(&self) -> &str {
        "pii_detector"
    }

    fn check(&self, text: &str) -> anyhow::Result<GuardOutcome> {
        let findings = find(text);
        if let Some(critical) = findings.iter().find(|f| f.severity == PiiSeverity::Critical) {
            return Ok(GuardOutcome::block(format!("critical PII detected ({})", critical.family))
                .with_metadata(json!({ "family": critical.family })));
        }
        if !findings.is_empty() {
            let families: Vec<&str> = findings.iter().map(|f| f.family).collect();
            return Ok(GuardOutcome::warn(format!("sensitive PII detected ({})", families.join(", ")))
                .with_metadata(json!({ "redacted": redact(text) })));
        }
        Ok(GuardOutcome::pass())
    }
}
