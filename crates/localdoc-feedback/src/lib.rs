//! localdoc-feedback
//!
//! Persistent per-(query, chunk) relevance feedback and the learner that
//! feeds it from user ratings.
pub mod learner;
pub mod store;

pub use learner::FeedbackLearner;
pub use store::{FeedbackStats, FeedbackStore, JsonFeedbackStore, LOG_FILE, SNAPSHOT_FILE, SNAPSHOT_INTERVAL};
