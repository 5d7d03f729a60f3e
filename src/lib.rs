//! # Concord
//!
//! A local-first document question-answering assistant.
//!
//! Concord ingests documents (plain text, Markdown, PDF, Word), chunks and
//! embeds them into per-file and concatenated index scopes, and answers
//! questions over a scope with hybrid retrieval (semantic + BM25, fused by
//! weighted reciprocal rank and reranked) feeding a streaming chat model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌───────────────┐
//! │  Loader  │──▶│  Chunk (+context) │──▶│  Index pair    │
//! │ txt/pdf/ │   │  Embed            │   │ vectors+chunks │
//! │ md/docx  │   └───────────────────┘   └──────┬────────┘
//! └──────────┘                                  │ SQLite metadata
//!                                               ▼
//!                        ┌──────────────────────────────┐
//!                        │  Hybrid retrieve → rerank    │
//!                        │  → prompt → stream answer    │
//!                        └──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! concord init                       # create the metadata store
//! concord ingest notes.md report.pdf # index documents
//! concord list                       # show index scopes
//! concord chat                       # ask questions over everything
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`loader`] | File loading and text extraction |
//! | [`chunker`] | Overlapping text chunking |
//! | [`contextualizer`] | LLM chunk contextualization |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`vector_index`] | Cosine top-k index with JSON persistence |
//! | [`lexical`] | BM25 lexical index |
//! | [`retriever`] | Hybrid fusion and reranking |
//! | [`llm`] | Chat model client |
//! | [`ingest`] | Ingestion pipeline |
//! | [`store`] | SQLite metadata store |
//! | [`chat`] | Streaming conversation engine |

pub mod chat;
pub mod chunker;
pub mod config;
pub mod contextualizer;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod lexical;
pub mod llm;
pub mod loader;
pub mod models;
pub mod retriever;
pub mod store;
pub mod vector_index;
