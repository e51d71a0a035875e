//! localdoc-core
//!
//! Data model, error taxonomy, typed configuration and the trait seams shared
//! by the text, vector, feedback and hybrid crates.
pub mod config;
pub mod corpus;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use corpus::Corpus;
pub use error::{Error, InputError, Result, StorageError};
