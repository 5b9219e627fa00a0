// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Markdown-as-source-of-truth helpers: `MEMORY.md` and dated `memory/*.md`
//! files are the durable record; the SQLite index is a derived, rebuildable
//! cache over them.

use std::path::{Path, PathBuf};

use chrono::Utc;

/// Path to the top-level `MEMORY.md` under the data directory.
pub fn memory_md_path(data_dir: &Path) -> PathBuf {
    data_dir.join("MEMORY.md")
}

/// Path to the `memory/` subdirectory holding dated entries.
pub fn memory_dir_path(data_dir: &Path) -> PathBuf {
    data_dir.join("memory")
}

/// Path to today's dated memory file, e.g. `memory/2026-07-28.md`.
pub fn today_memory_file_path(data_dir: &Path) -> PathBuf {
    memory_dir_path(data_dir).join(format!("{}.md", Utc::now().format("%Y-%m-%d")))
}

/// Every markdown file under the memory tree: `MEMORY.md` plus each
/// `memory/*.md`, sorted by path for deterministic indexing order.
pub fn list_memory_files(data_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let memory_md = memory_md_path(data_dir);
    if memory_md.is_file() {
        files.push(memory_md);
    }
    let dir = memory_dir_path(data_dir);
    if dir.is_dir() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
            .collect();
        entries.sort();
        files.extend(entries);
    }
    Ok(files)
}

/// Appends a new `## heading` section with `body` to `path`, creating the
/// file (and its parent directory) if needed. Never rewrites existing
/// content: memory files grow by append only.
pub fn append_section(path: &Path, heading: &str, body: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let existing = if path.is_file() { std::fs::read_to_string(path)? } else { String::new() };
    let needs_separator = !existing.is_empty() && !existing.ends_with("\n\n");
    let mut out = existing;
    if needs_separator {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(&format!("## {heading}\n{}\n", body.trim_end()));
    std::fs::write(path, out)?;
    Ok(())
}

/// Reads the full text of a memory markdown file, or an empty string if it
/// does not yet exist.
pub fn read_memory_file(path: &Path) -> anyhow::Result<String> {
    if path.is_file() {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(String::new())
    }
}
