use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Caller mistakes. Surfaced to the caller, never fatal to the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("query is empty after normalization")]
    EmptyQuery,

    #[error("unknown chunk id '{0}'")]
    UnknownChunk(String),

    #[error("unknown document id '{0}'")]
    UnknownDocument(String),

    #[error("chunk id '{0}' is already assigned")]
    DuplicateChunk(String),

    #[error("document id '{0}' is already assigned")]
    DuplicateDocument(String),
}

/// Failures of persistent stores (feedback log, embedding cache).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
