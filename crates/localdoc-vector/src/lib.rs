//! localdoc-vector
//!
//! Embedding index over chunk vectors, plus the provider, cache and backfill
//! that populate it.
pub mod backfill;
pub mod cache;
pub mod embed_provider;
pub mod index;

pub use backfill::{backfill_embeddings, BackfillReport};
pub use cache::{content_hash, EmbeddingCache};
pub use embed_provider::{embed_query, local::LocalProvider, EmbedProvider};
pub use index::{cosine, EmbeddingIndex};
