// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! SQLite-backed hybrid (lexical + vector) chunk index.
//!
//! Three relations share one `rowid` keyspace: `chunks` (the record),
//! `chunks_fts` (FTS5 over `content`), `chunks_vec` (a `sqlite-vec` `vec0`
//! table over the embedding). A logical insert writes all three in one
//! transaction; `delete_by_file_path` removes matching rows from all three.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::chunk::Chunk;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub id: String,
    pub content: String,
    pub file_path: String,
    pub score: f32,
}

pub struct MemoryIndex {
    conn: Mutex<Connection>,
    dimension: usize,
}

static VEC_EXTENSION_INIT: std::sync::Once = std::sync::Once::new();

fn register_vec_extension() {
    VEC_EXTENSION_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });
}

impl MemoryIndex {
    pub fn open(path: &Path, dimension: usize) -> anyhow::Result<Self> {
        register_vec_extension();
        let conn = Connection::open(path)?;
        Self::init_schema(&conn, dimension)?;
        Ok(Self { conn: Mutex::new(conn), dimension })
    }

    pub fn open_in_memory(dimension: usize) -> anyhow::Result<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn, dimension)?;
        Ok(Self { conn: Mutex::new(conn), dimension })
    }

    fn init_schema(conn: &Connection, dimension: usize) -> anyhow::Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS chunks (
                rowid INTEGER PRIMARY KEY,
                id TEXT UNIQUE NOT NULL,
                content TEXT NOT NULL,
                file_path TEXT NOT NULL,
                idx INTEGER NOT NULL,
                token_count INTEGER NOT NULL
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                content, content='chunks', content_rowid='rowid'
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS chunks_vec USING vec0(
                embedding float[{dimension}]
            );"
        ))?;
        Ok(())
    }

    /// Transactional insert; existing ids are replaced.
    pub fn insert_chunks(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> anyhow::Result<()> {
        anyhow::ensure!(chunks.len() == embeddings.len(), "chunks/embeddings length mismatch");
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            anyhow::ensure!(embedding.len() == self.dimension, "embedding dimension mismatch");
            tx.execute("DELETE FROM chunks WHERE id = ?1", [&chunk.id])?;
            tx.execute(
                "INSERT INTO chunks (id, content, file_path, idx, token_count) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![chunk.id, chunk.content, chunk.file_path, chunk.index as i64, chunk.token_count as i64],
            )?;
            let rowid = tx.last_insert_rowid();
            tx.execute("INSERT INTO chunks_fts (rowid, content) VALUES (?1, ?2)", rusqlite::params![rowid, chunk.content])?;
            let blob = serialize_embedding(embedding);
            tx.execute("INSERT INTO chunks_vec (rowid, embedding) VALUES (?1, ?2)", rusqlite::params![rowid, blob])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Removes all chunks (and their fts/vec rows) belonging to `file_path`.
    pub fn delete_by_file_path(&self, file_path: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let rowids: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT rowid FROM chunks WHERE file_path = ?1")?;
            let rows = stmt.query_map([file_path], |r| r.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        for rowid in rowids {
            tx.execute("DELETE FROM chunks_fts WHERE rowid = ?1", [rowid])?;
            tx.execute("DELETE FROM chunks_vec WHERE rowid = ?1", [rowid])?;
        }
        tx.execute("DELETE FROM chunks WHERE file_path = ?1", [file_path])?;
        tx.commit()?;
        Ok(())
    }

    pub fn search_vector(&self, query_embedding: &[f32], k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        let conn = self.conn.lock().unwrap();
        let blob = serialize_embedding(query_embedding);
        let mut stmt = conn.prepare(
            "SELECT c.id, c.content, c.file_path, v.distance
             FROM chunks_vec v JOIN chunks c ON c.rowid = v.rowid
             WHERE v.embedding MATCH ?1 AND k = ?2
             ORDER BY v.distance",
        )?;
        let rows = stmt.query_map(rusqlite::params![blob, k as i64], |row| {
            let distance: f64 = row.get(3)?;
            Ok(ScoredChunk {
                id: row.get(0)?,
                content: row.get(1)?,
                file_path: row.get(2)?,
                score: (1.0 - distance) as f32,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn search_lexical(&self, query: &str, k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.content, c.file_path, bm25(chunks_fts) AS rank
             FROM chunks_fts JOIN chunks c ON c.rowid = chunks_fts.rowid
             WHERE chunks_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![query, k as i64], |row| {
            let rank: f64 = row.get(3)?;
            Ok(ScoredChunk { id: row.get(0)?, content: row.get(1)?, file_path: row.get(2)?, score: -rank as f32 })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn hybrid_search(
        &self,
        query: &str,
        query_embedding: &[f32],
        limit: usize,
        candidate_multiplier: usize,
        vector_weight: f32,
        bm25_weight: f32,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        let k = limit * candidate_multiplier.max(1);
        let vector_hits = self.search_vector(query_embedding, k)?;
        let lexical_hits = self.search_lexical(query, k)?;
        Ok(merge_hybrid(vector_hits, lexical_hits, vector_weight, bm25_weight, limit))
    }
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Min-max normalizes `scores` into `[0,1]`. A single-element set normalizes
/// to `1.0`; a degenerate range (`max == min`) normalizes every element to
/// `1.0` as well.
fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    if scores.len() == 1 {
        return vec![1.0];
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

/// Combines vector and lexical candidate sets by normalized weighted sum.
/// Missing membership in one set scores 0 there. Ties break by higher
/// vector score, then higher lexical score, then lexicographic id.
fn merge_hybrid(
    vector_hits: Vec<ScoredChunk>,
    lexical_hits: Vec<ScoredChunk>,
    vector_weight: f32,
    bm25_weight: f32,
    limit: usize,
) -> Vec<ScoredChunk> {
    use std::collections::HashMap;

    let vec_scores = min_max_normalize(&vector_hits.iter().map(|c| c.score).collect::<Vec<_>>());
    let lex_scores = min_max_normalize(&lexical_hits.iter().map(|c| c.score).collect::<Vec<_>>());

    let mut by_id: HashMap<String, (ScoredChunk, f32, f32)> = HashMap::new();

    for (chunk, norm) in vector_hits.into_iter().zip(vec_scores) {
        by_id.entry(chunk.id.clone()).or_insert((chunk, 0.0, 0.0)).1 = norm;
    }
    for (chunk, norm) in lexical_hits.into_iter().zip(lex_scores) {
        let entry = by_id.entry(chunk.id.clone()).or_insert((chunk, 0.0, 0.0));
        entry.2 = norm;
    }

    let mut combined: Vec<(ScoredChunk, f32, f32, f32)> = by_id
        .into_values()
        .map(|(mut chunk, v, l)| {
            let combined_score = v * vector_weight + l * bm25_weight;
            chunk.score = combined_score;
            (chunk, combined_score, v, l)
        })
        .collect();

    combined.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap()
            .then_with(|| b.2.partial_cmp(&a.2).unwrap())
            .then_with(|| b.3.partial_cmp(&a.3).unwrap())
            .then_with(|| a.0.id.cmp(&b.0.id))
    });

    combined.into_iter().take(limit).map(|(chunk, ..)| chunk).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sc(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk { id: id.into(), content: String::new(), file_path: "m.md".into(), score }
    }

    #[test]
    fn min_max_normalize_single_element_is_one() {
        assert_eq!(min_max_normalize(&[0.3]), vec![1.0]);
    }

    #[test]
    fn min_max_normalize_degenerate_range_is_all_one() {
        assert_eq!(min_max_normalize(&[0.5, 0.5, 0.5]), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn min_max_normalize_scales_into_unit_range() {
        let normalized = min_max_normalize(&[1.0, 2.0, 3.0]);
        assert!((normalized[0] - 0.0).abs() < 1e-6);
        assert!((normalized[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn merge_hybrid_missing_in_one_set_scores_zero_there() {
        let vector_hits = vec![sc("a", 0.9), sc("b", 0.1)];
        let lexical_hits = vec![sc("a", 0.5)];
        let out = merge_hybrid(vector_hits, lexical_hits, 0.7, 0.3, 5);
        // "a" appears in both (normalized vec=1.0 since it's top, lex=1.0 single elem)
        // "b" only in vector set (normalized vec=0.0 since it's bottom, lex=0.0 missing)
        let a = out.iter().find(|c| c.id == "a").unwrap();
        let b = out.iter().find(|c| c.id == "b").unwrap();
        assert!(a.score > b.score);
    }

    #[test]
    fn merge_hybrid_respects_limit() {
        let vector_hits = vec![sc("a", 0.9), sc("b", 0.5), sc("c", 0.1)];
        let out = merge_hybrid(vector_hits, vec![], 0.7, 0.3, 2);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn merge_hybrid_ties_break_by_id_lexicographically() {
        let vector_hits = vec![sc("z", 0.5), sc("a", 0.5)];
        let out = merge_hybrid(vector_hits, vec![], 0.7, 0.3, 5);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn insert_and_delete_by_file_path_round_trip() {
        let index = MemoryIndex::open_in_memory(8).unwrap();
        let chunks = vec![
            Chunk { id: "m.md:0".into(), content: "ada likes tea".into(), file_path: "m.md".into(), index: 0, token_count: 4 },
        ];
        let embeddings = vec![vec![0.1; 8]];
        index.insert_chunks(&chunks, &embeddings).unwrap();
        index.delete_by_file_path("m.md").unwrap();
        let hits = index.search_lexical("ada", 5).unwrap();
        assert!(hits.is_empty());
    }
}
