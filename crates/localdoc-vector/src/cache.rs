//! JSON embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! The cache is consulted before calling a provider and filled on misses, so
//! re-ingesting unchanged text never re-embeds it. One file holds vectors of
//! a single embedder; a file written by another embedder is ignored.
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use localdoc_core::{Result, StorageError};

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    embedder_id: String,
    dim: usize,
    updated_at: DateTime<Utc>,
    entries: HashMap<String, Vec<f32>>,
}

#[derive(Debug)]
pub struct EmbeddingCache {
    path: PathBuf,
    embedder_id: String,
    dim: usize,
    entries: HashMap<String, Vec<f32>>,
    dirty: bool,
}

/// Hex blake3 of the text that was embedded.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

impl EmbeddingCache {
    /// Opens the cache at `path`; a missing file is an empty cache.
    pub fn open(path: impl Into<PathBuf>, embedder_id: &str, dim: usize) -> Result<Self> {
        let path = path.into();
        let mut cache = Self { path, embedder_id: embedder_id.to_string(), dim, entries: HashMap::new(), dirty: false };
        let bytes = match fs::read(&cache.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(cache),
            Err(e) => return Err(StorageError::io(&cache.path, e).into()),
        };
        let file: CacheFile = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Corrupt { path: cache.path.clone(), line: e.line(), message: e.to_string() })?;
        if file.embedder_id != embedder_id || file.dim != dim {
            warn!(path = %cache.path.display(), cached = %file.embedder_id, current = %embedder_id, "embedding cache belongs to another embedder; starting empty");
            return Ok(cache);
        }
        cache.entries = file.entries.into_iter().filter(|(_, v)| v.len() == dim).collect();
        debug!(path = %cache.path.display(), entries = cache.entries.len(), "embedding cache loaded");
        Ok(cache)
    }

    /// A cache that is never written to disk.
    pub fn in_memory(embedder_id: &str, dim: usize) -> Self {
        Self { path: PathBuf::new(), embedder_id: embedder_id.to_string(), dim, entries: HashMap::new(), dirty: false }
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, content_hash: &str) -> Option<&[f32]> {
        self.entries.get(content_hash).map(Vec::as_slice)
    }

    /// Stores a vector; vectors of the wrong dimension are ignored.
    pub fn put(&mut self, content_hash: String, vector: Vec<f32>) {
        if vector.len() != self.dim { return; }
        self.entries.insert(content_hash, vector);
        self.dirty = true;
    }

    /// Writes the cache atomically (temp file in the same directory, fsync,
    /// rename). Does nothing when unchanged or in-memory.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty || self.path.as_os_str().is_empty() { return Ok(()); }
        let file = CacheFile {
            embedder_id: self.embedder_id.clone(),
            dim: self.dim,
            updated_at: Utc::now(),
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec(&file).map_err(StorageError::from)?;
        write_atomic(&self.path, &bytes)?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.entries.len(), "embedding cache saved");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StorageError::io(path, e.error))?;
    Ok(())
}
