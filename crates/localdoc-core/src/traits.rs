/// Black-box embedding model. Implementations return vectors of `dim()`
/// floats, one per input text, in input order.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Deterministic text canonicalization shared by indexing, querying and
/// feedback signatures.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

/// Read side of the feedback store as seen by the ranker.
///
/// `Ok(0.0)` means no feedback was ever recorded for the pair; `Err` means
/// the store could not answer and must not be mistaken for absence.
pub trait FeedbackScores: Send + Sync {
    fn feedback_score(&self, query_signature: &str, chunk_id: &str) -> crate::Result<f32>;
}
