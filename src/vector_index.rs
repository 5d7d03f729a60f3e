//! In-memory embedding index with JSON persistence.
//!
//! Holds `(chunk_id, vector, chunk)` records and answers cosine top-k
//! queries. Each index scope persists to a single JSON file; the chunk list
//! needed to rebuild the lexical index is persisted separately by the
//! ingestion pipeline, and the two files are always written as a pair.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{Error, Result};
use crate::models::Chunk;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddingRecord {
    id: String,
    vector: Vec<f32>,
    chunk: Chunk,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    dims: usize,
    records: Vec<EmbeddingRecord>,
}

impl EmbeddingIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embed and add chunks in configured batches, preserving order.
    pub async fn add(
        &mut self,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<()> {
        let batch_size = batch_size.max(1);
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            for (chunk, vector) in batch.iter().zip(vectors) {
                self.records.push(EmbeddingRecord {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    chunk: chunk.clone(),
                });
            }
        }
        Ok(())
    }

    /// Top-k chunks by cosine similarity to `query_vector`, descending.
    /// Ties keep insertion order.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Vec<Chunk> {
        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| (idx, cosine_similarity(query_vector, &record.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(idx, _)| self.records[idx].chunk.clone())
            .collect()
    }

    /// Write the index to `path` via a temp file and rename, so readers
    /// never observe a partial index.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a persisted index. A missing or unreadable file is an error:
    /// this is the path used for scopes recorded in the metadata store,
    /// where silently returning an empty index would drop ingested data.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| Error::index_load(path.display().to_string(), e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::index_load(path.display().to_string(), e.to_string()))
    }

    /// Load a persisted index, treating a missing file as a fresh empty
    /// index. Corrupt files still fail. Used by ingestion, which may always
    /// proceed against a new scope.
    pub fn load_or_empty(path: &Path, dims: usize) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(dims));
        }
        Self::load(path)
    }
}

/// Persist a chunk list next to its index (same atomic write discipline).
pub fn persist_chunks(chunks: &[Chunk], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec(chunks)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a persisted chunk list. Missing or unreadable files are errors.
pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let bytes =
        fs::read(path).map_err(|e| Error::index_load(path.display().to_string(), e.to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::index_load(path.display().to_string(), e.to_string()))
}

/// Load a persisted chunk list, treating a missing file as empty.
pub fn load_chunks_or_empty(path: &Path) -> Result<Vec<Chunk>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    load_chunks(path)
}
