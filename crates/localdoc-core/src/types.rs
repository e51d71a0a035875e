//! Domain types shared by the normalizer, the embedding index, the feedback
//! store and the hybrid ranker.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InputError, Result};
use crate::traits::TextNormalizer;

pub type ChunkId = String;
pub type DocumentId = String;

/// How the text of a chunk was obtained. OCR output is scored exactly like
/// extracted text; the marker only exists for display and auditing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOrigin {
    #[default]
    Extracted,
    Ocr,
}

/// The smallest indexed unit of document text.
///
/// - `chunk_id`: unique within the corpus, immutable once assigned
/// - `page_number`/`line_number`: 1-based position in the source, when known
/// - `normalized_text`: output of the text normalizer over `raw_text`
/// - `embedding`: vector supplied by ingestion, if any
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub page_number: Option<u32>,
    pub line_number: Option<u32>,
    pub raw_text: String,
    pub normalized_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub origin: ChunkOrigin,
}

impl Chunk {
    pub fn new(chunk_id: impl Into<ChunkId>, document_id: impl Into<DocumentId>, raw_text: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            document_id: document_id.into(),
            page_number: None,
            line_number: None,
            raw_text: raw_text.into(),
            normalized_text: String::new(),
            embedding: None,
            origin: ChunkOrigin::Extracted,
        }
    }

    pub fn at(mut self, page_number: Option<u32>, line_number: Option<u32>) -> Self {
        self.page_number = page_number;
        self.line_number = line_number;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn normalized(mut self, normalizer: &dyn TextNormalizer) -> Self {
        self.normalized_text = normalizer.normalize(&self.raw_text);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    #[default]
    Txt,
    Pdf,
    Docx,
    Image,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::Txt),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Ordered chunks of one source file. Chunk order is the reading order and
/// is what context windows walk over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub source_path: PathBuf,
    pub format: DocumentFormat,
    pub chunks: Vec<Chunk>,
}

/// A user query after normalization. `scope` restricts ranking to a single
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub raw: String,
    pub normalized: String,
    pub scope: Option<DocumentId>,
}

impl Query {
    pub fn new(raw: &str, normalizer: &dyn TextNormalizer, scope: Option<DocumentId>) -> Result<Self> {
        let normalized = normalizer.normalize(raw);
        if normalized.is_empty() {
            return Err(InputError::EmptyQuery.into());
        }
        Ok(Self { raw: raw.to_string(), normalized, scope })
    }

    /// Key used for feedback lookup and recording.
    pub fn signature(&self) -> &str {
        &self.normalized
    }
}

/// Lines shown around a match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextWindow {
    pub before: Vec<String>,
    pub matched: String,
    pub after: Vec<String>,
}

impl ContextWindow {
    pub fn snippet(text: impl Into<String>) -> Self {
        Self { before: Vec::new(), matched: text.into(), after: Vec::new() }
    }

    pub fn char_len(&self) -> usize {
        self.before.iter().chain(std::iter::once(&self.matched)).chain(self.after.iter()).map(|l| l.chars().count()).sum()
    }

    pub fn render(&self) -> String {
        self.before
            .iter()
            .chain(std::iter::once(&self.matched))
            .chain(self.after.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One ranked chunk with every signal that went into its position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub page_number: Option<u32>,
    pub line_number: Option<u32>,
    pub semantic_score: f32,
    pub fuzzy_score: f32,
    /// Raw accumulated feedback sum for the (query, chunk) pair.
    pub feedback_score: f32,
    pub final_score: f32,
    pub context: ContextWindow,
}

/// One user rating action. Appended to the feedback log, never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackRecord {
    pub query_signature: String,
    pub chunk_id: ChunkId,
    pub adjustment: i32,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(query_signature: impl Into<String>, chunk_id: impl Into<ChunkId>, relevant: bool) -> Self {
        Self {
            query_signature: query_signature.into(),
            chunk_id: chunk_id.into(),
            adjustment: if relevant { 1 } else { -1 },
            timestamp: Utc::now(),
        }
    }
}
