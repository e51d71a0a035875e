//! localdoc-hybrid
//!
//! Fuses semantic, fuzzy and feedback signals into ranked results, builds
//! display and LLM context around them, and offers a search facade over a
//! loaded corpus.
pub mod context;
pub mod engine;
pub mod ranker;

pub use context::{build_llm_context, ContextBlock, ContextBuilder};
pub use engine::{SearchEngine, SearchOptions};
pub use ranker::{normalize_feedback, Degradation, HybridRanker, QueryVector, RankOptions, RankedResults, Signals};
