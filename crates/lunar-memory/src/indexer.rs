// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Watches the memory markdown tree and keeps the [`MemoryIndex`] in sync
//! with it. Markdown is the source of truth; the index is a derived cache
//! that can always be rebuilt from the files on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;

use crate::chunk::chunk_markdown;
use crate::embed::Embedder;
use crate::files::{list_memory_files, read_memory_file};
use crate::index::MemoryIndex;

const DEFAULT_BATCH_SIZE: usize = 10;

pub struct MemoryIndexer {
    index: Arc<MemoryIndex>,
    embedder: Arc<dyn Embedder>,
    word_budget: usize,
    overlap_words: usize,
    batch_size: usize,
    last_indexed_ms: Mutex<HashMap<PathBuf, u128>>,
}

impl MemoryIndexer {
    pub fn new(index: Arc<MemoryIndex>, embedder: Arc<dyn Embedder>, word_budget: usize, overlap_words: usize) -> Self {
        Self {
            index,
            embedder,
            word_budget,
            overlap_words,
            batch_size: DEFAULT_BATCH_SIZE,
            last_indexed_ms: Mutex::new(HashMap::new()),
        }
    }

    /// Re-chunks, re-embeds and re-inserts every memory file, regardless of
    /// modification time. Used at startup to build the index from scratch.
    pub async fn index_all(&self, data_dir: &Path) -> anyhow::Result<usize> {
        let files = list_memory_files(data_dir)?;
        let mut total = 0;
        for file in files {
            total += self.index_file(&file).await?;
        }
        Ok(total)
    }

    /// Re-indexes only files whose on-disk mtime is newer than the last
    /// recorded index time for that path. Call after a filesystem-watch
    /// event or a memory-write tool run.
    pub async fn index_changed(&self, data_dir: &Path) -> anyhow::Result<usize> {
        let files = list_memory_files(data_dir)?;
        let mut total = 0;
        for file in files {
            if self.is_stale(&file)? {
                total += self.index_file(&file).await?;
            }
        }
        Ok(total)
    }

    fn is_stale(&self, file: &Path) -> anyhow::Result<bool> {
        let modified_ms = file_modified_ms(file)?;
        let last_indexed = self.last_indexed_ms.lock().unwrap();
        Ok(match last_indexed.get(file) {
            Some(recorded) => modified_ms > *recorded,
            None => true,
        })
    }

    async fn index_file(&self, file: &Path) -> anyhow::Result<usize> {
        let file_path = file.to_string_lossy().to_string();
        let content = read_memory_file(file)?;
        self.index.delete_by_file_path(&file_path)?;

        let chunks = chunk_markdown(&file_path, &content, self.word_budget, self.overlap_words);
        let count = chunks.len();

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            self.index.insert_chunks(batch, &embeddings)?;
        }

        let modified_ms = file_modified_ms(file)?;
        self.last_indexed_ms.lock().unwrap().insert(file.to_path_buf(), modified_ms);
        Ok(count)
    }
}

fn file_modified_ms(file: &Path) -> anyhow::Result<u128> {
    let metadata = std::fs::metadata(file)?;
    let modified = metadata.modified()?;
    Ok(modified.duration_since(std::time::UNIX_EPOCH)?.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use tempfile::tempdir;

    fn indexer() -> MemoryIndexer {
        let index = Arc::new(MemoryIndex::open_in_memory(16).unwrap());
        let embedder = Arc::new(HashEmbedder::new(16));
        MemoryIndexer::new(index, embedder, 400, 80)
    }

    #[tokio::test]
    async fn index_all_indexes_every_memory_file() {
        let dir = tempdir().unwrap();
        crate::files::append_section(&crate::files::memory_md_path(dir.path()), "Name", "Ada likes tea").unwrap();
        let indexer = indexer();
        let count = indexer.index_all(dir.path()).await.unwrap();
        assert!(count > 0);
    }

    #[tokio::test]
    async fn index_changed_skips_unmodified_files() {
        let dir = tempdir().unwrap();
        crate::files::append_section(&crate::files::memory_md_path(dir.path()), "Name", "Ada").unwrap();
        let indexer = indexer();
        indexer.index_all(dir.path()).await.unwrap();
        let second_pass = indexer.index_changed(dir.path()).await.unwrap();
        assert_eq!(second_pass, 0);
    }

    #[tokio::test]
    async fn index_changed_reindexes_after_modification() {
        let dir = tempdir().unwrap();
        let path = crate::files::memory_md_path(dir.path());
        crate::files::append_section(&path, "Name", "Ada").unwrap();
        let indexer = indexer();
        indexer.index_all(dir.path()).await.unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        crate::files::append_section(&path, "Job", "Engineer").unwrap();
        let reindexed = indexer.index_changed(dir.path()).await.unwrap();
        assert!(reindexed > 0);
    }

    #[tokio::test]
    async fn index_all_on_empty_data_dir_indexes_nothing() {
        let dir = tempdir().unwrap();
        let indexer = indexer();
        let count = indexer.index_all(dir.path()).await.unwrap();
        assert_eq!(count, 0);
    }
}
