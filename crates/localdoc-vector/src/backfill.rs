//! Fills an [`EmbeddingIndex`] for a set of chunks.
//!
//! Order of sources per chunk: the vector supplied by ingestion, the cache,
//! then the provider in batches. A batch the provider fails on leaves its
//! chunks without a vector; they stay eligible through the fuzzy signal.
use indicatif::ProgressBar;
use tracing::{info, warn};

use localdoc_core::types::{Chunk, ChunkId};
use localdoc_core::Result;

use crate::cache::{content_hash, EmbeddingCache};
use crate::embed_provider::EmbedProvider;
use crate::index::EmbeddingIndex;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub supplied: usize,
    pub cached: usize,
    pub embedded: usize,
    /// Chunks left without an embedding.
    pub missing: Vec<ChunkId>,
}

pub fn backfill_embeddings<'a>(
    index: &mut EmbeddingIndex,
    chunks: impl IntoIterator<Item = &'a Chunk>,
    provider: &dyn EmbedProvider,
    cache: &mut EmbeddingCache,
    batch_size: usize,
    progress: &ProgressBar,
) -> Result<BackfillReport> {
    let mut report = BackfillReport::default();
    let mut pending: Vec<(&'a Chunk, String)> = Vec::new();

    for chunk in chunks {
        if index.contains(&chunk.chunk_id) { continue; }
        if let Some(v) = &chunk.embedding {
            if v.len() == index.dim() {
                index.insert(chunk.chunk_id.clone(), v.clone())?;
                report.supplied += 1;
            } else {
                warn!(chunk_id = %chunk.chunk_id, got = v.len(), expected = index.dim(), "supplied embedding has wrong dimension; ignored");
                report.missing.push(chunk.chunk_id.clone());
            }
            progress.inc(1);
            continue;
        }
        let hash = content_hash(&chunk.raw_text);
        if let Some(v) = cache.get(&hash) {
            index.insert(chunk.chunk_id.clone(), v.to_vec())?;
            report.cached += 1;
            progress.inc(1);
        } else {
            pending.push((chunk, hash));
        }
    }

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|(c, _)| c.raw_text.clone()).collect();
        let vectors = match provider.embed_batch(&texts) {
            Ok(v) if v.len() == texts.len() && v.iter().all(|x| x.len() == index.dim()) => v,
            Ok(v) => {
                warn!(expected = texts.len(), got = v.len(), "provider returned malformed batch; chunks left without embeddings");
                report.missing.extend(batch.iter().map(|(c, _)| c.chunk_id.clone()));
                progress.inc(batch.len() as u64);
                continue;
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), size = batch.len(), "embedding batch failed; chunks left without embeddings");
                report.missing.extend(batch.iter().map(|(c, _)| c.chunk_id.clone()));
                progress.inc(batch.len() as u64);
                continue;
            }
        };
        for ((chunk, hash), vector) in batch.iter().zip(vectors) {
            cache.put(hash.clone(), vector.clone());
            index.insert(chunk.chunk_id.clone(), vector)?;
            report.embedded += 1;
        }
        progress.inc(batch.len() as u64);
    }

    info!(
        embedder = %provider.embedder_id(),
        supplied = report.supplied,
        cached = report.cached,
        embedded = report.embedded,
        missing = report.missing.len(),
        "embedding backfill finished"
    );
    Ok(report)
}
