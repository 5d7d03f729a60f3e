//! Error types for the question-answering pipeline.

use thiserror::Error;

/// Result type alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing settings. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// File extension outside the allow-list. Reported per file; a batch
    /// continues with its remaining files.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// A file matched the allow-list but its content could not be extracted.
    #[error("failed to parse '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// A persisted index recorded in the metadata store could not be read.
    /// Never silently replaced with an empty index.
    #[error("failed to load index from '{path}': {message}")]
    IndexLoad { path: String, message: String },

    /// Contextualization or generation call failure. Propagated to the
    /// caller; retries are an external concern.
    #[error("model invocation failed: {0}")]
    Model(String),

    /// Model output opened a thinking block but never closed it.
    #[error("malformed model output: missing closing thinking marker")]
    MalformedModelOutput,

    #[error("metadata store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    pub fn index_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IndexLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }
}
