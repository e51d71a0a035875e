//! Minimal plain-text ingestion: one chunk per non-empty line.
//!
//! Pages are separated by form feed (`\x0c`), the convention used by text
//! extractors for paginated sources. Richer formats and OCR are handled by
//! upstream extractors that hand over plain text.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::traits::TextNormalizer;
use crate::types::{Chunk, Document, DocumentFormat};

pub const PAGE_BREAK: char = '\x0c';

pub struct DataProcessor<'a> {
    normalizer: &'a dyn TextNormalizer,
}

impl<'a> DataProcessor<'a> {
    pub fn new(normalizer: &'a dyn TextNormalizer) -> Self { Self { normalizer } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Document>> {
        self.process_directory_limited(data_dir, usize::MAX)
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Document>> {
        let mut files = self.list_txt_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited to first files");
        }
        let mut documents = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), n = file_index + 1, total = files.len(), "processing file");
            let content = self.read_file_content(file_path)?;
            let doc_id = self.extract_doc_id(file_path, data_dir);
            documents.push(self.process_text(&doc_id, file_path, &content));
        }
        let chunks: usize = documents.iter().map(|d| d.chunks.len()).sum();
        info!(files = documents.len(), chunks, "processed documents");
        Ok(documents)
    }

    /// Splits already-extracted text into line chunks.
    pub fn process_text(&self, doc_id: &str, source_path: &Path, content: &str) -> Document {
        let mut chunks = Vec::new();
        for (page_index, page) in content.split(PAGE_BREAK).enumerate() {
            for (line_index, line) in page.lines().enumerate() {
                let text = line.trim();
                if text.is_empty() { continue; }
                let chunk = Chunk::new(format!("{}:{}", doc_id, chunks.len()), doc_id, text)
                    .at(Some(to_u32(page_index + 1)), Some(to_u32(line_index + 1)))
                    .normalized(self.normalizer);
                chunks.push(chunk);
            }
        }
        Document { document_id: doc_id.to_string(), source_path: source_path.to_path_buf(), format: DocumentFormat::Txt, chunks }
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => {
                let bytes = fs::read(file_path).map_err(|e| StorageError::io(file_path, e))?;
                Ok(String::from_utf8_lossy(&bytes).to_string())
            }
        }
    }

    fn extract_doc_id(&self, file_path: &Path, data_dir: &Path) -> String {
        let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        relative.to_string_lossy().replace('\\', "/")
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(std::result::Result::ok).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()).and_then(DocumentFormat::from_extension) == Some(DocumentFormat::Txt) {
                txt_files.push(path.to_path_buf());
            }
        }
        txt_files.sort();
        txt_files
    }
}

fn to_u32(n: usize) -> u32 { u32::try_from(n).unwrap_or(u32::MAX) }
