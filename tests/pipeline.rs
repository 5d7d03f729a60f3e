//! End-to-end pipeline test: ingest real files into a temporary store, open
//! the concatenated scope, and run a chat turn over it with deterministic
//! stand-ins for the model backends.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use concord::chat::ChatEngine;
use concord::config::{
    ChunkingConfig, Config, EmbeddingConfig, LlmConfig, PromptsConfig, RetrievalConfig,
    StorageConfig,
};
use concord::embedding::Embedder;
use concord::error::Result;
use concord::ingest::{concat_document_path, concat_vector_path, IngestionPipeline};
use concord::llm::ChatModel;
use concord::models::{ChatEvent, Message};
use concord::retriever::{EmbedReranker, HybridRetriever};
use concord::store::{MetadataStore, CONCATENATE};
use concord::vector_index::{load_chunks, EmbeddingIndex};

/// Embeds by topic keyword so similarity is predictable.
struct TopicEmbedder;

fn topic_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let axes = ["brewing", "gardening", "astronomy"];
    let mut v: Vec<f32> = axes
        .iter()
        .map(|axis| if lower.contains(axis) { 1.0 } else { 0.0 })
        .collect();
    if v.iter().all(|&x| x == 0.0) {
        v[0] = 0.05;
    }
    v
}

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(topic_vector(text))
    }

    fn dims(&self) -> usize {
        3
    }
}

/// Streams a canned answer in two fragments.
struct CannedModel;

#[async_trait]
impl ChatModel for CannedModel {
    async fn invoke(&self, _messages: &[Message]) -> Result<String> {
        Ok("Use water at 93 degrees.".to_string())
    }

    async fn stream(&self, _messages: &[Message]) -> Result<BoxStream<'static, Result<String>>> {
        let fragments = vec!["Use water ".to_string(), "at 93 degrees.".to_string()];
        Ok(stream::iter(fragments.into_iter().map(Ok)).boxed())
    }
}

fn config_for(root: &Path) -> Config {
    Config {
        storage: StorageConfig {
            db_path: root.join("data/meta.db"),
            vector_dir: root.join("data/vectors"),
            document_dir: root.join("data/documents"),
        },
        chunking: ChunkingConfig {
            chunk_size: 120,
            chunk_overlap: 20,
            contextualize: false,
        },
        retrieval: RetrievalConfig {
            top_n: 1,
            ..RetrievalConfig::default()
        },
        embedding: EmbeddingConfig {
            model: "stub".to_string(),
            dims: 3,
            batch_size: 4,
        },
        llm: LlmConfig {
            base_url: "http://localhost:11434".to_string(),
            model: "stub".to_string(),
            temperature: 0.4,
            timeout_secs: 5,
        },
        prompts: PromptsConfig::default(),
    }
}

async fn open_store(config: &Config) -> MetadataStore {
    let store = MetadataStore::connect(&config.storage.db_path).await.unwrap();
    store
        .create_table_if_absent(
            &concat_vector_path(config).display().to_string(),
            &concat_document_path(config).display().to_string(),
        )
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn ingest_then_chat_over_the_concatenated_scope() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());

    let brewing = tmp.path().join("brewing.md");
    let gardening = tmp.path().join("gardening.txt");
    fs::write(
        &brewing,
        "Brewing basics: grind fresh, use water just off the boil, and steep \
         for four minutes before pressing.",
    )
    .unwrap();
    fs::write(
        &gardening,
        "Gardening in spring: turn the soil, plant after the last frost, and \
         water in the early morning.",
    )
    .unwrap();

    let store = open_store(&config).await;
    let pipeline = IngestionPipeline::new(&config, &TopicEmbedder, None, &store);
    let report = pipeline
        .ingest(&[brewing, gardening], true)
        .await
        .unwrap();
    assert_eq!(report.ingested.len(), 2);

    // Per-file scopes plus the seeded concatenated scope.
    let records = store.list_all().await.unwrap();
    assert_eq!(records.len(), 3);
    let concat = records.iter().find(|r| r.name == CONCATENATE).unwrap();

    let index = EmbeddingIndex::load(Path::new(&concat.vector_path)).unwrap();
    let chunks = load_chunks(Path::new(&concat.document_path)).unwrap();
    assert_eq!(index.len(), chunks.len());

    let mut engine = ChatEngine::new(
        Arc::new(CannedModel),
        Arc::new(TopicEmbedder),
        Arc::new(EmbedReranker::new(TopicEmbedder)),
        config.prompts.clone(),
    );
    engine.set_retriever(Some(HybridRetriever::new(
        index,
        &chunks,
        config.retrieval.clone(),
    )));

    let events: Vec<ChatEvent> = engine
        .ask("what temperature for brewing")
        .map(|e| e.unwrap())
        .collect()
        .await;

    let ChatEvent::Sources(sources) = &events[0] else {
        panic!("first event must be sources");
    };
    assert!(!sources.is_empty());
    assert!(sources.iter().all(|c| c.source == "brewing.md"));

    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::Chunk(c) => Some(c.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "Use water at 93 degrees.");

    assert!(matches!(
        events.last(),
        Some(ChatEvent::FinalAnswer(a)) if a == "Use water at 93 degrees."
    ));

    let history = engine.history().await;
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn reingesting_grows_the_concatenated_scope() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());

    let first = tmp.path().join("astronomy.txt");
    fs::write(&first, "Astronomy notes: the moon waxes and wanes.").unwrap();

    let store = open_store(&config).await;
    let pipeline = IngestionPipeline::new(&config, &TopicEmbedder, None, &store);

    pipeline.ingest(&[first.clone()], true).await.unwrap();
    let before = load_chunks(&concat_document_path(&config)).unwrap().len();

    pipeline.ingest(&[first], true).await.unwrap();
    let after = load_chunks(&concat_document_path(&config)).unwrap().len();
    assert_eq!(after, before * 2);
}
