// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Hybrid (lexical + vector) retrieval over the markdown memory tree.
//!
//! Markdown files (`MEMORY.md`, `memory/*.md`) are the durable source of
//! truth. [`MemoryIndex`] is a SQLite-backed cache over them, kept current
//! by [`MemoryIndexer`]. [`MemoryStore`] wires index, indexer and embedder
//! together behind the one entry point callers need.

mod chunk;
mod embed;
mod files;
mod index;
mod indexer;

pub use chunk::{chunk_markdown, Chunk};
pub use embed::{Embedder, FastEmbedEmbedder, HashEmbedder};
pub use files::{append_section, list_memory_files, memory_dir_path, memory_md_path, read_memory_file, today_memory_file_path};
pub use index::{MemoryIndex, ScoredChunk};
pub use indexer::MemoryIndexer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lunar_config::MemoryConfig;

/// The composed memory subsystem: index + indexer + embedder, configured
/// from a [`MemoryConfig`] and rooted at a data directory.
pub struct MemoryStore {
    index: Arc<MemoryIndex>,
    indexer: MemoryIndexer,
    embedder: Arc<dyn Embedder>,
    data_dir: PathBuf,
    cfg: MemoryConfig,
}

impl MemoryStore {
    /// Opens the store using a local ONNX embedder. Falls back to the
    /// deterministic hash embedder if the ONNX runtime can't be
    /// initialized (e.g. no model cache available in this environment).
    pub fn open(cfg: MemoryConfig, data_dir: &Path) -> anyhow::Result<Self> {
        let embedder: Arc<dyn Embedder> = match FastEmbedEmbedder::new(cfg.embedding_dim) {
            Ok(e) => Arc::new(e),
            Err(err) => {
                tracing::warn!(error = %err, "falling back to hash embedder: failed to initialize fastembed");
                Arc::new(HashEmbedder::new(cfg.embedding_dim))
            }
        };
        Self::open_with_embedder(cfg, data_dir, embedder)
    }

    pub fn open_with_embedder(cfg: MemoryConfig, data_dir: &Path, embedder: Arc<dyn Embedder>) -> anyhow::Result<Self> {
        let index_path = cfg.index_path.as_deref().map(PathBuf::from).unwrap_or_else(|| data_dir.join("memory.db"));
        if let Some(parent) = index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let index = Arc::new(MemoryIndex::open(&index_path, cfg.embedding_dim)?);
        let indexer = MemoryIndexer::new(index.clone(), embedder.clone(), cfg.chunk_word_budget, cfg.chunk_overlap_words);
        Ok(Self { index, indexer, embedder, data_dir: data_dir.to_path_buf(), cfg })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Builds (or rebuilds) the index from every markdown file on disk.
    pub async fn index_all(&self) -> anyhow::Result<usize> {
        self.indexer.index_all(&self.data_dir).await
    }

    /// Re-indexes only files modified since they were last indexed.
    pub async fn index_changed(&self) -> anyhow::Result<usize> {
        self.indexer.index_changed(&self.data_dir).await
    }

    /// Hybrid-searches the index with the configured weights and limit.
    pub async fn search(&self, query: &str) -> anyhow::Result<Vec<ScoredChunk>> {
        self.search_with_limit(query, self.cfg.search_limit).await
    }

    pub async fn search_with_limit(&self, query: &str, limit: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        let query_embedding = self.embedder.embed_one(query).await?;
        self.index.hybrid_search(
            query,
            &query_embedding,
            limit,
            self.cfg.candidate_multiplier,
            self.cfg.vector_weight,
            self.cfg.bm25_weight,
        )
    }

    /// Appends a new dated entry to today's memory file and re-indexes it
    /// synchronously so the write is searchable immediately.
    pub async fn write(&self, heading: &str, body: &str) -> anyhow::Result<PathBuf> {
        let path = today_memory_file_path(&self.data_dir);
        append_section(&path, heading, body)?;
        self.indexer.index_changed(&self.data_dir).await?;
        Ok(path)
    }
}
