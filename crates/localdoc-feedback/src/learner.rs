//! Turns user relevance actions into feedback records.
use tracing::{debug, info};

use localdoc_core::traits::TextNormalizer;
use localdoc_core::types::Query;
use localdoc_core::{Corpus, InputError, Result};

use crate::store::FeedbackStore;

pub struct FeedbackLearner<'a> {
    store: &'a dyn FeedbackStore,
    corpus: &'a Corpus,
    normalizer: &'a dyn TextNormalizer,
    enabled: bool,
}

impl<'a> FeedbackLearner<'a> {
    pub fn new(store: &'a dyn FeedbackStore, corpus: &'a Corpus, normalizer: &'a dyn TextNormalizer) -> Self {
        Self { store, corpus, normalizer, enabled: true }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Records that `chunk_id` was (ir)relevant for `query_text`. The query
    /// is keyed by its normalized form, the same signature ranking reads.
    ///
    /// Returns the pair's new aggregate, or `None` when feedback is
    /// disabled. Input is validated either way.
    pub fn record(&self, query_text: &str, chunk_id: &str, relevant: bool) -> Result<Option<f32>> {
        let query = Query::new(query_text, self.normalizer, None)?;
        if !self.corpus.contains_chunk(chunk_id) {
            return Err(InputError::UnknownChunk(chunk_id.to_string()).into());
        }
        if !self.enabled {
            debug!(signature = %query.signature(), chunk_id, "feedback disabled; rating ignored");
            return Ok(None);
        }
        let score = self.store.record_feedback(query.signature(), chunk_id, relevant)?;
        info!(signature = %query.signature(), chunk_id, relevant, score, "feedback recorded");
        Ok(Some(score))
    }
}
