//! # Concord CLI (`concord`)
//!
//! Commands for store initialization, document ingestion, scope listing,
//! and an interactive chat loop with streamed answers.
//!
//! ```bash
//! concord --config ./concord.toml <command>
//! ```

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use concord::chat::ChatEngine;
use concord::config::{self, Config};
use concord::embedding::OllamaEmbedder;
use concord::ingest::{concat_document_path, concat_vector_path, IngestionPipeline};
use concord::llm::OllamaChat;
use concord::models::ChatEvent;
use concord::retriever::{EmbedReranker, HybridRetriever};
use concord::store::MetadataStore;
use concord::vector_index::{load_chunks, EmbeddingIndex};

/// Concord — a local document question-answering assistant.
#[derive(Parser)]
#[command(
    name = "concord",
    about = "Concord — chat with your documents using local models",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./concord.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the metadata store.
    ///
    /// Creates the SQLite database and seeds the concatenated scope.
    /// Idempotent.
    Init,

    /// Ingest documents.
    ///
    /// Each file becomes its own index scope; unless `--no-concatenate` is
    /// given, chunks also join the shared concatenated scope.
    Ingest {
        /// Files to ingest (txt, md, pdf, docx).
        files: Vec<PathBuf>,

        /// Do not add these files to the concatenated scope.
        #[arg(long)]
        no_concatenate: bool,
    },

    /// List index scopes.
    List,

    /// Start an interactive chat session.
    Chat {
        /// Scope id to chat over (see `concord list`). Defaults to the
        /// concatenated scope.
        #[arg(long)]
        scope: Option<i64>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = open_store(&cfg).await?;
            drop(store);
            println!("Metadata store initialized.");
        }
        Commands::Ingest {
            files,
            no_concatenate,
        } => {
            run_ingest(&cfg, &files, !no_concatenate).await?;
        }
        Commands::List => {
            let store = open_store(&cfg).await?;
            for record in store.list_all().await? {
                println!("{:>4}  {}", record.id, record.name);
            }
        }
        Commands::Chat { scope } => {
            run_chat(&cfg, scope).await?;
        }
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> anyhow::Result<MetadataStore> {
    let store = MetadataStore::connect(&cfg.storage.db_path).await?;
    store
        .create_table_if_absent(
            &concat_vector_path(cfg).display().to_string(),
            &concat_document_path(cfg).display().to_string(),
        )
        .await?;
    Ok(store)
}

async fn run_ingest(cfg: &Config, files: &[PathBuf], concatenate: bool) -> anyhow::Result<()> {
    if files.is_empty() {
        anyhow::bail!("no files given");
    }

    let store = open_store(cfg).await?;
    let embedder = OllamaEmbedder::new(&cfg.llm, &cfg.embedding);
    let chat_model = OllamaChat::new(&cfg.llm);
    let pipeline = IngestionPipeline::new(cfg, &embedder, Some(&chat_model), &store);

    let report = pipeline.ingest(files, concatenate).await?;
    for file in &report.ingested {
        println!("ingested {}", file);
    }
    for (file, reason) in &report.skipped {
        println!("skipped {} ({})", file, reason);
    }
    Ok(())
}

async fn run_chat(cfg: &Config, scope: Option<i64>) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;

    let record = match scope {
        Some(id) => store
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no scope with id {}", id))?,
        None => store
            .list_all()
            .await?
            .into_iter()
            .find(|r| r.name == concord::store::CONCATENATE)
            .ok_or_else(|| anyhow::anyhow!("concatenated scope missing; run `concord init`"))?,
    };

    let embedder = Arc::new(OllamaEmbedder::new(&cfg.llm, &cfg.embedding));
    let reranker = Arc::new(EmbedReranker::new(OllamaEmbedder::with_model(
        &cfg.llm,
        cfg.retrieval.reranker_model.clone(),
        cfg.embedding.dims,
    )));
    let model = Arc::new(OllamaChat::new(&cfg.llm));

    let mut engine = ChatEngine::new(model, embedder, reranker, cfg.prompts.clone());

    let vector_path = Path::new(&record.vector_path);
    if vector_path.exists() {
        let index = EmbeddingIndex::load(vector_path)?;
        let chunks = load_chunks(Path::new(&record.document_path))?;
        engine.set_retriever(Some(HybridRetriever::new(
            index,
            &chunks,
            cfg.retrieval.clone(),
        )));
        println!("chatting over '{}' ({} chunks)", record.name, chunks.len());
    } else {
        // The seeded concatenated scope has no index until the first ingest.
        warn!(scope = %record.name, "scope has no index yet, answering without context");
        println!("scope '{}' is empty; answers will not be grounded", record.name);
    }

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        let mut turn = Box::pin(engine.ask(question));
        while let Some(event) = turn.next().await {
            match event {
                Ok(ChatEvent::Sources(sources)) => {
                    if !sources.is_empty() {
                        let mut names: Vec<&str> =
                            sources.iter().map(|c| c.source.as_str()).collect();
                        names.dedup();
                        println!("[sources: {}]", names.join(", "));
                    }
                }
                Ok(ChatEvent::Chunk(fragment)) => {
                    print!("{}", fragment);
                    std::io::stdout().flush()?;
                }
                Ok(ChatEvent::FinalAnswer(_)) => {
                    println!();
                }
                Err(err) => {
                    println!();
                    eprintln!("turn failed: {}", err);
                    break;
                }
            }
        }
    }

    Ok(())
}
