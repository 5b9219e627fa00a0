// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::turn::{SessionSummary, Turn};

/// Append-only, per-session transcript store.
///
/// Each session lives at `{workspace}/sessions/{sessionIdSafe}.jsonl`, one
/// JSON-encoded [`Turn`] per line. Appends for a given session are
/// serialized by an exclusive lock held only for the duration of the write;
/// independent sessions never block each other.
pub struct TranscriptStore {
    workspace: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TranscriptStore {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self { workspace: workspace.into(), locks: Mutex::new(HashMap::new()) }
    }

    /// Derives the deterministic session id `"agent:{agentId}:{provider}:{peerId}"`.
    pub fn resolve(&self, provider: &str, peer_id: &str, agent_id: &str) -> String {
        format!("agent:{agent_id}:{provider}:{peer_id}")
    }

    fn safe_id(session_id: &str) -> String {
        session_id.replace(':', "-")
    }

    fn sessions_dir(&self) -> PathBuf {
        self.workspace.join("sessions")
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.jsonl", Self::safe_id(session_id)))
    }

    async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(session_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Appends one turn. The write (and its `fsync`) completes before this
    /// returns, so a crash immediately after observes the turn durably.
    pub async fn append_turn(&self, session_id: &str, turn: &Turn) -> anyhow::Result<()> {
        let lock = self.lock_for(session_id).await;
        let _guard = lock.lock().await;

        let dir = self.sessions_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = self.path_for(session_id);
        let line = serde_json::to_string(turn)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Replays the session file and returns the last `n` non-system turns,
    /// in original order. A missing file is an empty history; a line that
    /// fails to parse is skipped with a warning rather than failing the load.
    pub async fn load_recent(&self, session_id: &str, n: usize) -> anyhow::Result<Vec<Turn>> {
        let turns = self.load_all(session_id).await?;
        let non_system: Vec<Turn> = turns.into_iter().filter(|t| !t.is_system()).collect();
        let start = non_system.len().saturating_sub(n);
        Ok(non_system[start..].to_vec())
    }

    /// Replays every turn in the session file, including system turns.
    pub async fn load_all(&self, session_id: &str) -> anyhow::Result<Vec<Turn>> {
        let path = self.path_for(session_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut turns = Vec::new();
        for (i, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Turn>(line) {
                Ok(t) => turns.push(t),
                Err(e) => warn!(session_id, line_no = i, error = %e, "skipping corrupt transcript line"),
            }
        }
        Ok(turns)
    }

    /// Lists every known session with a turn count and last-turn timestamp.
    pub async fn list_sessions(&self) -> anyhow::Result<Vec<SessionSummary>> {
        let dir = self.sessions_dir();
        let mut summaries = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(summaries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let session_id = stem.replace('-', ":");
            let turns = self.load_all(&session_id).await.unwrap_or_default();
            summaries.push(SessionSummary {
                session_id,
                turn_count: turns.len(),
                last_ts: turns.last().map(|t| t.ts()),
            });
        }
        Ok(summaries)
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::Turn;
    use chrono::Utc;
    use tempfile::tempdir;

    fn turn(content: &str) -> Turn {
        Turn::User { content: content.into(), ts: Utc::now() }
    }

    #[test]
    fn resolve_builds_the_documented_session_id_shape() {
        let dir = tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        assert_eq!(store.resolve("telegram", "42", "default"), "agent:default:telegram:42");
    }

    #[tokio::test]
    async fn append_then_load_recent_round_trips() {
        let dir = tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let sid = store.resolve("cli", "local", "default");
        store.append_turn(&sid, &turn("hello")).await.unwrap();
        store.append_turn(&sid, &turn("world")).await.unwrap();
        let recent = store.load_recent(&sid, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn load_recent_caps_at_n_and_keeps_order() {
        let dir = tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let sid = store.resolve("cli", "local", "default");
        for i in 0..5 {
            store.append_turn(&sid, &turn(&i.to_string())).await.unwrap();
        }
        let recent = store.load_recent(&sid, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        match (&recent[0], &recent[1]) {
            (Turn::User { content: a, .. }, Turn::User { content: b, .. }) => {
                assert_eq!(a, "3");
                assert_eq!(b, "4");
            }
            _ => panic!("expected user turns"),
        }
    }

    #[tokio::test]
    async fn load_recent_excludes_system_turns() {
        let dir = tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let sid = store.resolve("cli", "local", "default");
        store.append_turn(&sid, &Turn::System { content: "boot".into(), ts: Utc::now() }).await.unwrap();
        store.append_turn(&sid, &turn("hi")).await.unwrap();
        let recent = store.load_recent(&sid, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn missing_session_file_loads_as_empty_history() {
        let dir = tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let recent = store.load_recent("agent:default:cli:nobody", 10).await.unwrap();
        assert!(recent.is_empty());
    }

    #[tokio::test]
    async fn corrupt_line_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let sid = store.resolve("cli", "local", "default");
        store.append_turn(&sid, &turn("good")).await.unwrap();
        let path = store.path_for(&sid);
        let mut f = tokio::fs::OpenOptions::new().append(true).open(&path).await.unwrap();
        f.write_all(b"{not valid json\n").await.unwrap();
        let all = store.load_all(&sid).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn transcript_file_is_append_only_byte_prefix() {
        let dir = tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let sid = store.resolve("cli", "local", "default");
        store.append_turn(&sid, &turn("first")).await.unwrap();
        let before = tokio::fs::read(store.path_for(&sid)).await.unwrap();
        store.append_turn(&sid, &turn("second")).await.unwrap();
        let after = tokio::fs::read(store.path_for(&sid)).await.unwrap();
        assert!(after.starts_with(&before));
    }

    #[tokio::test]
    async fn list_sessions_reports_turn_counts() {
        let dir = tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let sid = store.resolve("cli", "local", "default");
        store.append_turn(&sid, &turn("hi")).await.unwrap();
        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].turn_count, 1);
    }
}
