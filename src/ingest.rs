//! Ingestion pipeline: file to persisted, queryable index pair.
//!
//! Each file becomes its own index scope; unless disabled, its chunks are
//! also appended to the shared concatenated scope. Metadata rows are written
//! only after both JSON files of a pair are persisted, so the store never
//! points at an index that does not exist.

use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunker::Chunker;
use crate::config::Config;
use crate::contextualizer::Contextualizer;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::llm::ChatModel;
use crate::models::Chunk;
use crate::store::MetadataStore;
use crate::vector_index::{load_chunks_or_empty, persist_chunks, EmbeddingIndex};

/// File name (under both storage directories) of the concatenated scope.
const CONCAT_STEM: &str = "concatenate";

pub fn concat_vector_path(config: &Config) -> PathBuf {
    config
        .storage
        .vector_dir
        .join(format!("{}.json", CONCAT_STEM))
}

pub fn concat_document_path(config: &Config) -> PathBuf {
    config
        .storage
        .document_dir
        .join(format!("{}.json", CONCAT_STEM))
}

/// Outcome of one ingestion batch. Files that fail to load are skipped and
/// reported; model and storage failures abort the batch.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub ingested: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

pub struct IngestionPipeline<'a> {
    config: &'a Config,
    embedder: &'a dyn Embedder,
    model: Option<&'a dyn ChatModel>,
    store: &'a MetadataStore,
    // Serializes read-modify-write cycles on the concatenated scope.
    concat_lock: Mutex<()>,
}

impl<'a> IngestionPipeline<'a> {
    /// `model` is only consulted when `chunking.contextualize` is set.
    pub fn new(
        config: &'a Config,
        embedder: &'a dyn Embedder,
        model: Option<&'a dyn ChatModel>,
        store: &'a MetadataStore,
    ) -> Self {
        Self {
            config,
            embedder,
            model,
            store,
            concat_lock: Mutex::new(()),
        }
    }

    /// Ingest a batch of files. With `concatenate` set, every file's chunks
    /// are also appended to the shared concatenated scope.
    pub async fn ingest(&self, files: &[PathBuf], concatenate: bool) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for path in files {
            let chunks = match self.ingest_one(path).await {
                Ok(chunks) => chunks,
                Err(err @ (Error::UnsupportedFileType(_) | Error::FileParse { .. })) => {
                    warn!(file = %path.display(), error = %err, "skipping file");
                    report
                        .skipped
                        .push((path.display().to_string(), err.to_string()));
                    continue;
                }
                Err(err) => return Err(err),
            };

            if concatenate {
                self.append_to_concat(&chunks).await?;
            }
            report.ingested.push(path.display().to_string());
        }

        Ok(report)
    }

    /// Chunk, optionally contextualize, index, persist, and record one file.
    /// Returns the chunks so the caller can fold them into the concatenated
    /// scope without re-chunking.
    async fn ingest_one(&self, path: &Path) -> Result<Vec<Chunk>> {
        let document = crate::loader::load_file(path)?;
        let chunker = Chunker::new(&self.config.chunking);
        let mut chunks = chunker.split(&document);

        if self.config.chunking.contextualize {
            let model = self
                .model
                .ok_or_else(|| Error::config("contextualization enabled but no chat model"))?;
            let contextualizer = Contextualizer::new(model, &self.config.prompts);
            chunks = contextualizer.contextualize_all(&document, &chunks).await?;
        }

        let mut index = EmbeddingIndex::new(self.config.embedding.dims);
        index
            .add(&chunks, self.embedder, self.config.embedding.batch_size)
            .await?;

        let stem = Uuid::new_v4().to_string();
        let vector_path = self
            .config
            .storage
            .vector_dir
            .join(format!("{}.json", stem));
        let document_path = self
            .config
            .storage
            .document_dir
            .join(format!("{}.json", stem));

        index.persist(&vector_path)?;
        persist_chunks(&chunks, &document_path)?;
        self.store
            .insert(
                &document.name,
                &vector_path.display().to_string(),
                &document_path.display().to_string(),
            )
            .await?;

        info!(
            file = %document.name,
            chunks = chunks.len(),
            "ingested document"
        );
        Ok(chunks)
    }

    async fn append_to_concat(&self, chunks: &[Chunk]) -> Result<()> {
        let _guard = self.concat_lock.lock().await;

        let vector_path = concat_vector_path(self.config);
        let document_path = concat_document_path(self.config);

        let mut index =
            EmbeddingIndex::load_or_empty(&vector_path, self.config.embedding.dims)?;
        let mut all_chunks = load_chunks_or_empty(&document_path)?;

        index
            .add(chunks, self.embedder, self.config.embedding.batch_size)
            .await?;
        all_chunks.extend_from_slice(chunks);

        index.persist(&vector_path)?;
        persist_chunks(&all_chunks, &document_path)?;
        Ok(())
    }
}
