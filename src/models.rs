//! Core data models used throughout Concord.
//!
//! These types represent the documents, chunks, messages, and events that
//! flow through the ingestion and conversation pipelines.

use serde::{Deserialize, Serialize};

/// A loaded document: the source of truth for chunking.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original file name, carried into chunk metadata as `source`.
    pub name: String,
    /// Extracted plain-text content.
    pub content: String,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A bounded excerpt of a document: the atomic retrieval unit.
///
/// Chunks are persisted as JSON alongside each vector index so the lexical
/// index can be rebuilt without re-reading the original file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text. When contextualization is enabled this is the generated
    /// context, a blank line, then the original excerpt.
    pub content: String,
    /// Name of the document this chunk was cut from.
    pub source: String,
}

impl Chunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
        }
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One immutable entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Event emitted by the conversation engine during one question-answer turn.
///
/// Every turn yields `Sources`, then zero or more `Chunk`s in generation
/// order, then exactly one `FinalAnswer`. Consumers match exhaustively.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The retrieved context, emitted once retrieval completes. Empty when
    /// no retriever is bound.
    Sources(Vec<Chunk>),
    /// One streamed fragment of the answer.
    Chunk(String),
    /// The complete answer with any thinking scratch content removed.
    FinalAnswer(String),
}

/// One row of the metadata store: maps a document name to its persisted
/// index pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IndexRecord {
    pub id: i64,
    pub name: String,
    pub vector_path: String,
    pub document_path: String,
}
