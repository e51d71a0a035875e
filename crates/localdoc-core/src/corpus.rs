//! In-memory collection of ingested documents.
//!
//! Documents are kept in insertion order and chunks in reading order, which
//! is the order the ranker uses to break score ties.
use std::collections::HashMap;

use crate::error::{InputError, Result};
use crate::types::{Chunk, Document};

#[derive(Debug, Default)]
pub struct Corpus {
    documents: Vec<Document>,
    doc_positions: HashMap<String, usize>,
    chunk_positions: HashMap<String, (usize, usize)>,
}

impl Corpus {
    pub fn new() -> Self { Self::default() }

    pub fn from_documents(documents: Vec<Document>) -> Result<Self> {
        let mut corpus = Self::new();
        for doc in documents { corpus.add_document(doc)?; }
        Ok(corpus)
    }

    /// Adds a document. Chunk ids must be unique across the whole corpus;
    /// on conflict nothing is added.
    pub fn add_document(&mut self, document: Document) -> Result<()> {
        if self.doc_positions.contains_key(&document.document_id) {
            return Err(InputError::DuplicateDocument(document.document_id.clone()).into());
        }
        let mut seen = std::collections::HashSet::new();
        for chunk in &document.chunks {
            if self.chunk_positions.contains_key(&chunk.chunk_id) || !seen.insert(chunk.chunk_id.as_str()) {
                return Err(InputError::DuplicateChunk(chunk.chunk_id.clone()).into());
            }
        }
        let doc_pos = self.documents.len();
        for (i, chunk) in document.chunks.iter().enumerate() {
            self.chunk_positions.insert(chunk.chunk_id.clone(), (doc_pos, i));
        }
        self.doc_positions.insert(document.document_id.clone(), doc_pos);
        self.documents.push(document);
        Ok(())
    }

    pub fn documents(&self) -> &[Document] { &self.documents }

    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.doc_positions.get(document_id).map(|&p| &self.documents[p])
    }

    pub fn chunk(&self, chunk_id: &str) -> Option<&Chunk> {
        self.locate(chunk_id).map(|(doc, i)| &doc.chunks[i])
    }

    pub fn contains_chunk(&self, chunk_id: &str) -> bool { self.chunk_positions.contains_key(chunk_id) }

    /// The owning document and the chunk's index within it.
    pub fn locate(&self, chunk_id: &str) -> Option<(&Document, usize)> {
        self.chunk_positions.get(chunk_id).map(|&(d, i)| (&self.documents[d], i))
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.documents.iter().flat_map(|d| d.chunks.iter())
    }

    pub fn chunk_count(&self) -> usize { self.chunk_positions.len() }

    pub fn is_empty(&self) -> bool { self.chunk_positions.is_empty() }

    /// Ranking candidates: the whole corpus, or a single document when
    /// `scope` is set.
    pub fn candidates(&self, scope: Option<&str>) -> Result<Vec<&Chunk>> {
        match scope {
            None => Ok(self.chunks().collect()),
            Some(id) => {
                let doc = self.document(id).ok_or_else(|| InputError::UnknownDocument(id.to_string()))?;
                Ok(doc.chunks.iter().collect())
            }
        }
    }
}
