//! localdoc-text
//!
//! Text normalization (case folding, abbreviation expansion, whitespace) and
//! threshold-gated fuzzy matching over normalized text.
pub mod fuzzy;
pub mod normalize;

pub use fuzzy::FuzzyMatcher;
pub use normalize::Normalizer;
