//! Search facade wiring corpus, embedding index, feedback store and ranker
//! together for one loaded configuration.
use std::collections::HashMap;

use indicatif::ProgressBar;
use parking_lot::Mutex;
use tracing::{info, warn};

use localdoc_core::config::{ContextMode, Settings};
use localdoc_core::traits::FeedbackScores;
use localdoc_core::{Corpus, Result};
use localdoc_feedback::{FeedbackLearner, FeedbackStore, JsonFeedbackStore};
use localdoc_vector::{backfill_embeddings, embed_query, BackfillReport, EmbedProvider, EmbeddingCache, EmbeddingIndex};

use crate::context::{build_llm_context, ContextBlock, ContextBuilder};
use crate::ranker::{HybridRanker, QueryVector, RankOptions, RankedResults, Signals};

const QUERY_CACHE_LIMIT: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub top_k: Option<usize>,
    pub mode: Option<ContextMode>,
}

/// Stands in for the store while feedback is disabled.
struct NoFeedback;

impl FeedbackScores for NoFeedback {
    fn feedback_score(&self, _query_signature: &str, _chunk_id: &str) -> Result<f32> { Ok(0.0) }
}

pub struct SearchEngine<S: FeedbackStore = JsonFeedbackStore> {
    settings: Settings,
    corpus: Corpus,
    index: EmbeddingIndex,
    provider: Box<dyn EmbedProvider>,
    feedback: S,
    ranker: HybridRanker,
    context: ContextBuilder,
    query_vectors: Mutex<HashMap<String, Vec<f32>>>,
}

impl<S: FeedbackStore> SearchEngine<S> {
    pub fn new(settings: Settings, corpus: Corpus, index: EmbeddingIndex, provider: Box<dyn EmbedProvider>, feedback: S) -> Result<Self> {
        settings.validate()?;
        let ranker = HybridRanker::from_settings(&settings)?;
        let context = ContextBuilder::from_settings(&settings.context);
        if index.embedder_id() != provider.embedder_id() {
            warn!(index = %index.embedder_id(), provider = %provider.embedder_id(), "index and query embedder differ; semantic scores will be unavailable");
        }
        Ok(Self { settings, corpus, index, provider, feedback, ranker, context, query_vectors: Mutex::new(HashMap::new()) })
    }

    /// Embeds every chunk without a vector (cache first) and builds the
    /// engine over the resulting index.
    pub fn build(
        settings: Settings,
        corpus: Corpus,
        provider: Box<dyn EmbedProvider>,
        feedback: S,
        cache: &mut EmbeddingCache,
        progress: &ProgressBar,
    ) -> Result<(Self, BackfillReport)> {
        let mut index = EmbeddingIndex::new(provider.embedder_id(), provider.dim()).with_rescale(settings.search.semantic_rescale);
        let report = backfill_embeddings(&mut index, corpus.chunks(), provider.as_ref(), cache, settings.embedding.batch_size, progress)?;
        let engine = Self::new(settings, corpus, index, provider, feedback)?;
        Ok((engine, report))
    }

    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn corpus(&self) -> &Corpus { &self.corpus }
    pub fn index(&self) -> &EmbeddingIndex { &self.index }
    pub fn feedback_store(&self) -> &S { &self.feedback }

    pub fn search(&self, raw_query: &str, scope: Option<&str>, options: SearchOptions) -> Result<RankedResults> {
        let query = self.ranker.query(raw_query, scope.map(str::to_string))?;
        let candidates = self.corpus.candidates(scope)?;
        if candidates.is_empty() {
            return Ok(RankedResults::default());
        }

        let vector = self.query_vector(&query.normalized);
        let query_vector = match &vector {
            Ok(v) => QueryVector::Ready(v),
            Err(reason) => QueryVector::Unavailable(reason),
        };
        let feedback: &dyn FeedbackScores = if self.settings.feedback.enabled { &self.feedback } else { &NoFeedback };
        let signals = Signals { index: &self.index, query_vector, feedback };
        let rank_options = RankOptions { top_k: Some(options.top_k.unwrap_or(self.settings.search.top_k)) };

        let mut ranked = self.ranker.rank(&query, &candidates, &signals, rank_options)?;
        let context = match options.mode {
            Some(mode) => self.context.clone().with_mode(mode),
            None => self.context.clone(),
        };
        context.attach(&self.corpus, &mut ranked.results);
        info!(query = %query.signature(), results = ranked.results.len(), degraded = ranked.degraded.len(), "search complete");
        Ok(ranked)
    }

    /// Rates a chunk for a query; `None` when feedback is disabled.
    pub fn record_feedback(&self, raw_query: &str, chunk_id: &str, relevant: bool) -> Result<Option<f32>> {
        FeedbackLearner::new(&self.feedback, &self.corpus, self.ranker.normalizer())
            .enabled(self.settings.feedback.enabled)
            .record(raw_query, chunk_id, relevant)
    }

    /// Top results as bounded context blocks for an LLM collaborator.
    pub fn llm_context(&self, raw_query: &str, scope: Option<&str>) -> Result<Vec<ContextBlock>> {
        let ranked = self.search(raw_query, scope, SearchOptions::default())?;
        Ok(build_llm_context(&ranked.results, self.settings.context.max_context_chars))
    }

    fn query_vector(&self, normalized: &str) -> std::result::Result<Vec<f32>, String> {
        if let Some(v) = self.query_vectors.lock().get(normalized) {
            return Ok(v.clone());
        }
        let v = embed_query(self.provider.as_ref(), normalized).map_err(|e| e.to_string())?;
        let mut cache = self.query_vectors.lock();
        if cache.len() >= QUERY_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(normalized.to_string(), v.clone());
        Ok(v)
    }
}
