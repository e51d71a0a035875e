//! Embedding provider abstraction used by the index backfill and by query
//! embedding.
//!
//! Providers must return vectors of `dim()` floats for a given
//! `embedder_id`; vectors from different ids are never mixed in one index or
//! cache.
use anyhow::Result;

pub trait EmbedProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `hash:d256`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Maximum token length for this provider.
    fn max_len(&self) -> usize;
    /// Compute embeddings for a batch of input texts.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embeds one query, mapping collaborator failures onto the core error type.
pub fn embed_query(provider: &dyn EmbedProvider, text: &str) -> localdoc_core::Result<Vec<f32>> {
    let mut out = provider
        .embed_batch(&[text.to_string()])
        .map_err(|e| localdoc_core::Error::Embedding(format!("{e:#}")))?;
    let v = out.pop().ok_or_else(|| localdoc_core::Error::Embedding("provider returned no vector".to_string()))?;
    if v.len() != provider.dim() {
        return Err(localdoc_core::Error::DimensionMismatch { expected: provider.dim(), got: v.len() });
    }
    Ok(v)
}

pub mod local;
