// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// End-to-end integration tests wiring the mock model provider through the
/// real tool router, memory store, and transcript store.
use std::sync::Arc;

use lunar_channels::{ChatType, Envelope};
use lunar_config::{Config, MemoryConfig};
use lunar_core::Agent;
use lunar_memory::MemoryStore;
use lunar_model::MockProvider;
use lunar_transcript::TranscriptStore;

fn test_agent(data_dir: &std::path::Path) -> Agent {
    let memory = Arc::new(MemoryStore::open(MemoryConfig::default(), data_dir).unwrap());
    let router = lunar_tools::build_router(&Config::default(), memory);
    let transcript = Arc::new(TranscriptStore::new(data_dir));
    Agent::new(Box::new(MockProvider::default()), router, transcript, &Config::default())
}

#[tokio::test]
async fn agent_handles_message_with_mock_provider() {
    let dir = tempfile::tempdir().unwrap();
    let agent = test_agent(dir.path());
    let envelope = Envelope::new("cli", "alice", "hello there", ChatType::Direct);

    let reply = agent.handle_message(&envelope).await.unwrap();
    assert!(reply.contains("hello there"), "mock provider should echo the input, got: {reply}");
}

#[tokio::test]
async fn agent_persists_turns_to_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let agent = test_agent(dir.path());
    let envelope = Envelope::new("cli", "bob", "remember this", ChatType::Direct);
    agent.handle_message(&envelope).await.unwrap();

    let transcript = TranscriptStore::new(dir.path());
    let session_id = agent.session_id(&envelope);
    let turns = transcript.load_all(&session_id).await.unwrap();
    assert_eq!(turns.len(), 2, "a user turn and an assistant turn should have been appended");
}

#[tokio::test]
async fn memory_store_indexes_and_searches_markdown() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("MEMORY.md"), "# Memory Index\n\n- [Coffee](coffee.md) — brewing notes\n").unwrap();
    std::fs::create_dir_all(dir.path().join("memory")).unwrap();
    std::fs::write(dir.path().join("memory/coffee.md"), "---\nname: coffee\ndescription: brewing notes\n---\n\nPour-over ratio is 1:16, water at 94C.\n").unwrap();

    let memory = MemoryStore::open(MemoryConfig::default(), dir.path()).unwrap();
    let indexed = memory.index_all().await.unwrap();
    assert!(indexed > 0, "expected at least one chunk to be indexed");

    let hits = memory.search("pour-over ratio").await.unwrap();
    assert!(!hits.is_empty(), "expected the coffee chunk to match");
}

#[test]
fn config_defaults_are_valid() {
    let cfg = Config::default();
    assert_eq!(cfg.model.provider, "openai");
    assert_eq!(cfg.agent.max_iterations, 10);
    assert!((cfg.memory.vector_weight + cfg.memory.bm25_weight - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn tool_router_denies_unknown_tool() {
    let dir = tempfile::tempdir().unwrap();
    let memory = Arc::new(MemoryStore::open(MemoryConfig::default(), dir.path()).unwrap());
    let router = lunar_tools::build_router(&Config::default(), memory);

    let call = lunar_tools::ToolCall { id: "1".into(), name: "does_not_exist".into(), args: serde_json::json!({}) };
    let (output, audit) = router.dispatch("session-1", call).await;
    assert!(output.is_error);
    assert!(audit.allowed, "permission check allows, execution itself fails");
}
