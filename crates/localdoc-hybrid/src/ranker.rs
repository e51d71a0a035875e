//! Hybrid ranking: semantic, fuzzy and feedback signals fused into one
//! ordered result list.
//!
//! `final = w_sem * semantic + w_fuzzy * fuzzy + w_fb * normalize_feedback(feedback)`
//!
//! Candidates are scored in parallel and merged in candidate order before a
//! stable sort, so equal scores always come out in candidate order. A signal
//! that cannot be computed for a chunk degrades to 0 for that chunk and is
//! reported in [`RankedResults::degraded`]; it never fails the request.
use std::borrow::Cow;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, warn};

use localdoc_core::config::{RankingWeights, Settings};
use localdoc_core::traits::FeedbackScores;
use localdoc_core::types::{Chunk, ChunkId, ContextWindow, DocumentId, Query, ScoredResult};
use localdoc_core::{Error, Result};
use localdoc_text::{FuzzyMatcher, Normalizer};
use localdoc_vector::EmbeddingIndex;

/// A signal that was unavailable while ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// The chunk has no embedding; its semantic score is 0.
    MissingEmbedding { chunk_id: ChunkId },
    /// The query could not be embedded; every semantic score is 0.
    QueryEmbedding { reason: String },
    /// The feedback store failed for this chunk; its feedback score is 0.
    FeedbackUnavailable { chunk_id: ChunkId, reason: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RankedResults {
    pub results: Vec<ScoredResult>,
    pub degraded: Vec<Degradation>,
}

impl RankedResults {
    pub fn is_degraded(&self) -> bool { !self.degraded.is_empty() }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RankOptions {
    /// Keep only the best `top_k` results.
    pub top_k: Option<usize>,
}

/// The query side of the semantic signal. Callers embed the query once (or
/// take it from a cache) before ranking.
#[derive(Debug, Clone, Copy)]
pub enum QueryVector<'a> {
    Ready(&'a [f32]),
    Unavailable(&'a str),
}

pub struct Signals<'a> {
    pub index: &'a EmbeddingIndex,
    pub query_vector: QueryVector<'a>,
    pub feedback: &'a dyn FeedbackScores,
}

/// Squashes an unbounded feedback sum into (-1, 1).
pub fn normalize_feedback(score: f32) -> f32 {
    if score.is_nan() { return 0.0; }
    if score.is_infinite() { return score.signum(); }
    score / (1.0 + score.abs())
}

#[derive(Debug, Clone)]
pub struct HybridRanker {
    normalizer: Normalizer,
    fuzzy: FuzzyMatcher,
    weights: RankingWeights,
    semantic_threshold: f32,
}

impl HybridRanker {
    pub fn new(normalizer: Normalizer, fuzzy: FuzzyMatcher, weights: RankingWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { normalizer, fuzzy, weights, semantic_threshold: 0.0 })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let normalizer = Normalizer::from_settings(&settings.normalize)?;
        let fuzzy = FuzzyMatcher::from_settings(&settings.search)?;
        Ok(Self::new(normalizer, fuzzy, settings.effective_weights())?.with_semantic_threshold(settings.search.semantic_threshold))
    }

    pub fn with_semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = threshold;
        self
    }

    pub fn weights(&self) -> RankingWeights { self.weights }
    pub fn normalizer(&self) -> &Normalizer { &self.normalizer }

    /// Normalizes raw query text; an empty result is an input error.
    pub fn query(&self, raw: &str, scope: Option<DocumentId>) -> Result<Query> {
        Query::new(raw, &self.normalizer, scope)
    }

    pub fn rank(&self, query: &Query, candidates: &[&Chunk], signals: &Signals<'_>, options: RankOptions) -> Result<RankedResults> {
        let mut degraded = Vec::new();
        if candidates.is_empty() {
            return Ok(RankedResults::default());
        }

        let query_vector = match signals.query_vector {
            QueryVector::Ready(v) if v.len() == signals.index.dim() => Some(v),
            QueryVector::Ready(v) => {
                let reason = Error::DimensionMismatch { expected: signals.index.dim(), got: v.len() }.to_string();
                warn!(%reason, "query vector unusable; semantic signal disabled for this query");
                degraded.push(Degradation::QueryEmbedding { reason });
                None
            }
            QueryVector::Unavailable(reason) => {
                warn!(%reason, "query embedding unavailable; semantic signal disabled for this query");
                degraded.push(Degradation::QueryEmbedding { reason: reason.to_string() });
                None
            }
        };

        let scored: Vec<(Option<ScoredResult>, Vec<Degradation>)> = candidates
            .par_iter()
            .map(|chunk| self.score_chunk(query, chunk, signals, query_vector))
            .collect();

        let mut results = Vec::with_capacity(scored.len());
        for (result, notes) in scored {
            degraded.extend(notes);
            results.extend(result);
        }
        results.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        if let Some(k) = options.top_k {
            results.truncate(k);
        }
        debug!(signature = %query.signature(), candidates = candidates.len(), returned = results.len(), degraded = degraded.len(), "ranked");
        Ok(RankedResults { results, degraded })
    }

    fn score_chunk(
        &self,
        query: &Query,
        chunk: &Chunk,
        signals: &Signals<'_>,
        query_vector: Option<&[f32]>,
    ) -> (Option<ScoredResult>, Vec<Degradation>) {
        let mut notes = Vec::new();

        let semantic = match query_vector {
            None => 0.0,
            Some(v) => match signals.index.similarity(v, &chunk.chunk_id) {
                Ok(Some(s)) if s >= self.semantic_threshold => s,
                Ok(Some(_)) => 0.0,
                Ok(None) => {
                    warn!(chunk_id = %chunk.chunk_id, signal = "semantic", "chunk has no embedding");
                    notes.push(Degradation::MissingEmbedding { chunk_id: chunk.chunk_id.clone() });
                    0.0
                }
                Err(e) => {
                    warn!(chunk_id = %chunk.chunk_id, signal = "semantic", error = %e, "similarity failed");
                    notes.push(Degradation::MissingEmbedding { chunk_id: chunk.chunk_id.clone() });
                    0.0
                }
            },
        };

        let text: Cow<'_, str> = if chunk.normalized_text.is_empty() {
            Cow::Owned(self.normalizer.normalize(&chunk.raw_text))
        } else {
            Cow::Borrowed(&chunk.normalized_text)
        };
        let fuzzy = self.fuzzy.score(&query.normalized, &text);

        let feedback = match signals.feedback.feedback_score(query.signature(), &chunk.chunk_id) {
            Ok(f) => f,
            Err(e) => {
                error!(chunk_id = %chunk.chunk_id, error = %e, "feedback lookup failed; scoring without feedback");
                notes.push(Degradation::FeedbackUnavailable { chunk_id: chunk.chunk_id.clone(), reason: e.to_string() });
                0.0
            }
        };

        // No match on either text signal: only net positive feedback keeps the
        // chunk, so a chunk with nothing but down-votes is dropped rather than
        // listed with a negative score.
        if semantic == 0.0 && fuzzy == 0.0 && feedback <= 0.0 {
            return (None, notes);
        }

        let w = self.weights;
        let final_score = w.w_sem * semantic + w.w_fuzzy * fuzzy + w.w_fb * normalize_feedback(feedback);
        let result = ScoredResult {
            chunk_id: chunk.chunk_id.clone(),
            document_id: chunk.document_id.clone(),
            page_number: chunk.page_number,
            line_number: chunk.line_number,
            semantic_score: semantic,
            fuzzy_score: fuzzy,
            feedback_score: feedback,
            final_score,
            context: ContextWindow::snippet(chunk.raw_text.clone()),
        };
        (Some(result), notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_feedback_is_bounded_and_odd() {
        assert_eq!(normalize_feedback(0.0), 0.0);
        assert_eq!(normalize_feedback(1.0), 0.5);
        assert_eq!(normalize_feedback(-1.0), -0.5);
        assert_eq!(normalize_feedback(f32::INFINITY), 1.0);
        assert_eq!(normalize_feedback(f32::NAN), 0.0);
        assert!(normalize_feedback(1e30) <= 1.0);
    }
}
