// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Produces fixed-dimension embeddings for text. Abstracted behind a trait
/// so tests can substitute a deterministic hash-based embedder without
/// pulling in the ONNX runtime.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = self.embed_batch(&[text.to_string()]).await?;
        Ok(v.pop().unwrap_or_default())
    }
}

/// Local ONNX embedder (BGE-base by default, 768-dim).
pub struct FastEmbedEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    dimension: usize,
}

impl FastEmbedEmbedder {
    pub fn new(dimension: usize) -> anyhow::Result<Self> {
        let model = fastembed::TextEmbedding::try_new(Default::default())?;
        Ok(Self { model: std::sync::Mutex::new(model), dimension })
    }
}

#[async_trait]
impl Embedder for FastEmbedEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        let model = self.model.lock().unwrap_or_else(|p| p.into_inner());
        let embeddings = model.embed(texts, None)?;
        Ok(embeddings)
    }
}

/// Deterministic hash-based embedder for tests and offline use: no ONNX
/// runtime, no network. Stable across runs for the same input text.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dimension)).collect())
    }
}

fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut out = vec![0f32; dimension];
    let mut counter: u32 = 0;
    let mut remaining = dimension;
    let mut offset = 0;
    while remaining > 0 {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for byte in digest.iter() {
            if remaining == 0 {
                break;
            }
            out[offset] = (*byte as f32 / 255.0) * 2.0 - 1.0;
            offset += 1;
            remaining -= 1;
        }
        counter += 1;
    }
    let norm: f32 = out.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in out.iter_mut() {
            *v /= norm;
        }
    }
    out
}
