//! TOML configuration, constructed once at startup and passed by reference
//! into every component constructor.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// SQLite metadata store location.
    pub db_path: PathBuf,
    /// Directory for persisted vector indexes.
    pub vector_dir: PathBuf,
    /// Directory for persisted chunk lists.
    pub document_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target window size in characters.
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Enrich each chunk with an LLM-generated situating summary.
    #[serde(default)]
    pub contextualize: bool,
}

fn default_chunk_overlap() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Candidates taken from the embedding index.
    #[serde(default = "default_semantic_k")]
    pub semantic_k: usize,
    /// Candidates taken from the lexical (BM25) index.
    #[serde(default = "default_lexical_k")]
    pub lexical_k: usize,
    /// Rank-fusion weight of the semantic list.
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    /// Rank-fusion weight of the lexical list.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    /// Hard cap on reranked context passed to generation.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Model used by the reranker to score relevance, independent of the
    /// retrieval scores.
    #[serde(default = "default_reranker_model")]
    pub reranker_model: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_k: default_semantic_k(),
            lexical_k: default_lexical_k(),
            semantic_weight: default_semantic_weight(),
            lexical_weight: default_lexical_weight(),
            top_n: default_top_n(),
            reranker_model: default_reranker_model(),
        }
    }
}

fn default_semantic_k() -> usize {
    8
}
fn default_lexical_k() -> usize {
    8
}
fn default_semantic_weight() -> f64 {
    0.6
}
fn default_lexical_weight() -> f64 {
    0.4
}
fn default_top_n() -> usize {
    4
}
fn default_reranker_model() -> String {
    "nomic-embed-text".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding model identifier (e.g. `nomic-embed-text`).
    pub model: String,
    /// Vector dimensionality produced by the model.
    pub dims: usize,
    /// Texts embedded per request batch during ingestion.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Generation model identifier.
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_temperature() -> f32 {
    0.4
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptsConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Per-turn template; placeholders `{question}` and `{context}`.
    #[serde(default = "default_query_template")]
    pub query_template: String,
    /// Per-file context block; placeholders `{name}` and `{content}`.
    #[serde(default = "default_file_template")]
    pub file_template: String,
    /// Contextualization prompt; placeholders `{document}` and `{chunk}`.
    #[serde(default = "default_context_prompt")]
    pub context_prompt: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            query_template: default_query_template(),
            file_template: default_file_template(),
            context_prompt: default_context_prompt(),
        }
    }
}

fn default_system_prompt() -> String {
    "You are a careful assistant that answers questions using only the \
     provided document excerpts. Cite the source file name when you rely on \
     an excerpt. If the context does not contain the answer, say so."
        .to_string()
}

fn default_query_template() -> String {
    "Context:\n{context}\n\nQuestion: {question}".to_string()
}

fn default_file_template() -> String {
    "File: {name}\n{content}".to_string()
}

fn default_context_prompt() -> String {
    "Here is a document:\n\n{document}\n\nHere is one excerpt from it:\n\n\
     {chunk}\n\nWrite a short context that situates this excerpt within the \
     whole document. Answer with the context only."
        .to_string()
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config =
        toml::from_str(&content).map_err(|e| Error::config(format!("invalid config: {}", e)))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(Error::config("chunking.chunk_size must be > 0"));
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        return Err(Error::config(
            "chunking.chunk_overlap must be smaller than chunking.chunk_size",
        ));
    }
    if config.embedding.dims == 0 {
        return Err(Error::config("embedding.dims must be > 0"));
    }
    if config.embedding.batch_size == 0 {
        return Err(Error::config("embedding.batch_size must be > 0"));
    }
    if config.retrieval.top_n == 0 {
        return Err(Error::config("retrieval.top_n must be >= 1"));
    }
    for (key, weight) in [
        ("semantic_weight", config.retrieval.semantic_weight),
        ("lexical_weight", config.retrieval.lexical_weight),
    ] {
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::config(format!(
                "retrieval.{} must be in [0.0, 1.0]",
                key
            )));
        }
    }
    Ok(())
}
