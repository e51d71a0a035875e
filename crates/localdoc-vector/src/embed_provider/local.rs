//! Local embedding provider over the models in `localdoc-embed`.
//!
//! `embedding.fake = true` switches to the hashing embedder for fast and
//! deterministic outputs in tests and development.
use anyhow::Result;
use localdoc_core::config::EmbeddingSettings;
use localdoc_core::traits::Embedder as CoreEmbedder;
use localdoc_embed::default_embedder;

use super::EmbedProvider;

pub struct LocalProvider {
    inner: Box<dyn CoreEmbedder>,
    id: String,
}

impl LocalProvider {
    /// Create a local provider for the configured embedder.
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let inner = default_embedder(settings)?;
        let kind = if settings.fake { "hash" } else { "bge-m3" };
        Ok(Self::from_embedder(kind, inner))
    }

    pub fn from_embedder(kind: &str, inner: Box<dyn CoreEmbedder>) -> Self {
        let id = format!("{kind}:d{}", inner.dim());
        Self { inner, id }
    }
}

impl EmbedProvider for LocalProvider {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { self.inner.embed_batch(texts) }
}
