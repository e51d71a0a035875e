//! In-memory embedding index: one L2-normalized vector per chunk, all of one
//! dimension and one embedder.
//!
//! Built once before serving and read through `&self` while ranking. Chunks
//! without a vector are simply absent; callers treat that as a missing
//! semantic signal.
use std::collections::HashMap;

use localdoc_core::config::SemanticRescale;
use localdoc_core::types::ChunkId;
use localdoc_core::{Error, InputError, Result};

#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    embedder_id: String,
    dim: usize,
    rescale: SemanticRescale,
    ids: Vec<ChunkId>,
    vectors: Vec<Vec<f32>>,
    positions: HashMap<ChunkId, usize>,
}

impl EmbeddingIndex {
    pub fn new(embedder_id: impl Into<String>, dim: usize) -> Self {
        Self {
            embedder_id: embedder_id.into(),
            dim,
            rescale: SemanticRescale::default(),
            ids: Vec::new(),
            vectors: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn with_rescale(mut self, rescale: SemanticRescale) -> Self {
        self.rescale = rescale;
        self
    }

    pub fn embedder_id(&self) -> &str { &self.embedder_id }
    pub fn dim(&self) -> usize { self.dim }
    pub fn len(&self) -> usize { self.ids.len() }
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }
    pub fn contains(&self, chunk_id: &str) -> bool { self.positions.contains_key(chunk_id) }

    /// Adds the vector for a chunk. A chunk's vector is set once.
    pub fn insert(&mut self, chunk_id: impl Into<ChunkId>, vector: Vec<f32>) -> Result<()> {
        let chunk_id = chunk_id.into();
        self.check_dim(&vector)?;
        if self.positions.contains_key(&chunk_id) {
            return Err(InputError::DuplicateChunk(chunk_id).into());
        }
        self.positions.insert(chunk_id.clone(), self.ids.len());
        self.ids.push(chunk_id);
        self.vectors.push(l2_normalized(vector));
        Ok(())
    }

    /// Rescaled similarity in [0, 1], or `None` when the chunk has no vector.
    pub fn similarity(&self, query_vector: &[f32], chunk_id: &str) -> Result<Option<f32>> {
        self.check_dim(query_vector)?;
        let query = l2_normalized(query_vector.to_vec());
        Ok(self.positions.get(chunk_id).map(|&i| self.rescaled(dot(&query, &self.vectors[i]))))
    }

    /// Best `k` chunks by rescaled similarity, highest first; equal scores
    /// keep insertion order.
    pub fn top_k(&self, query_vector: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        self.check_dim(query_vector)?;
        let query = l2_normalized(query_vector.to_vec());
        let mut scored: Vec<(usize, f32)> =
            self.vectors.iter().enumerate().map(|(i, v)| (i, self.rescaled(dot(&query, v)))).collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(i, s)| (self.ids[i].clone(), s)).collect())
    }

    /// Clamp by default so unrelated chunks can score exactly 0 and drop out
    /// of ranking; `SemanticRescale::Shift` gives the `(cos + 1) / 2` mapping.
    fn rescaled(&self, cos: f32) -> f32 {
        let cos = cos.clamp(-1.0, 1.0);
        match self.rescale {
            SemanticRescale::Clamp => cos.max(0.0),
            SemanticRescale::Shift => (cos + 1.0) / 2.0,
        }
    }

    fn check_dim(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dim {
            Ok(())
        } else {
            Err(Error::DimensionMismatch { expected: self.dim, got: vector.len() })
        }
    }
}

/// Raw cosine similarity in [-1, 1]; 0 when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let na = norm(a);
    let nb = norm(b);
    if na == 0.0 || nb == 0.0 { return 0.0; }
    (dot(a, b) / (na * nb)).clamp(-1.0, 1.0)
}

fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

fn norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

fn l2_normalized(mut v: Vec<f32>) -> Vec<f32> {
    let n = norm(&v);
    if n > 0.0 { for x in &mut v { *x /= n; } }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_and_shift_rescaling() {
        let mut idx = EmbeddingIndex::new("t", 2);
        idx.insert("opposite", vec![-1.0, 0.0]).unwrap();
        assert_eq!(idx.similarity(&[1.0, 0.0], "opposite").unwrap(), Some(0.0));
        let shifted = idx.clone().with_rescale(SemanticRescale::Shift);
        assert_eq!(shifted.similarity(&[1.0, 0.0], "opposite").unwrap(), Some(0.0));
        assert_eq!(shifted.similarity(&[0.0, 1.0], "opposite").unwrap(), Some(0.5));
    }
}
