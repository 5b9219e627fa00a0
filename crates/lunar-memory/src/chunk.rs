// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Splits a memory markdown file into bounded chunks for indexing.

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub file_path: String,
    pub index: usize,
    pub token_count: usize,
}

/// Splits `content` (the text of one markdown file at `file_path`) into
/// chunks on headings of depth <= 3 (`#`, `##`, `###`), then further splits
/// any section exceeding `word_budget` words into overlapping sub-chunks of
/// `overlap_words` words.
pub fn chunk_markdown(file_path: &str, content: &str, word_budget: usize, overlap_words: usize) -> Vec<Chunk> {
    let sections = split_on_headings(content);
    let mut chunks = Vec::new();
    let mut index = 0usize;

    for section in sections {
        let words: Vec<&str> = section.split_whitespace().collect();
        if words.len() <= word_budget {
            if section.trim().is_empty() {
                continue;
            }
            chunks.push(make_chunk(file_path, index, section));
            index += 1;
            continue;
        }

        let step = word_budget.saturating_sub(overlap_words).max(1);
        let mut start = 0;
        while start < words.len() {
            let end = (start + word_budget).min(words.len());
            let sub = words[start..end].join(" ");
            chunks.push(make_chunk(file_path, index, sub));
            index += 1;
            if end == words.len() {
                break;
            }
            start += step;
        }
    }

    chunks
}

fn make_chunk(file_path: &str, index: usize, content: String) -> Chunk {
    let token_count = (content.len() / 4).max(1);
    Chunk { id: format!("{file_path}:{index}"), content, file_path: file_path.to_string(), index, token_count }
}

/// Splits markdown text on `#`/`##`/`###` heading lines, keeping the heading
/// line as part of the section that follows it.
fn split_on_headings(content: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        let is_heading = {
            let trimmed = line.trim_start();
            let hashes = trimmed.chars().take_while(|c| *c == '#').count();
            (1..=3).contains(&hashes) && trimmed.as_bytes().get(hashes) == Some(&b' ')
        };
        if is_heading && !current.trim().is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        sections.push(current);
    }
    if sections.is_empty() {
        sections.push(content.to_string());
    }
    sections
}
