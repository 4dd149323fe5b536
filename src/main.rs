//! `codelens` command-line entry point.
//!
//! - `codelens index <PATH>` chunks and embeds a source tree
//! - `codelens search <PATH> <QUERY>` prints the reranked result block
//! - `codelens ask <PATH> <QUESTION>` answers from the retrieved results
//! - `codelens stats <PATH>` / `codelens delete <PATH>` inspect or drop the index

mod answer;
mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use codelens_index::collection::collection_name;
use codelens_index::format::format_results;
use codelens_index::in_memory_store::InMemoryVectorStore;
use codelens_index::indexer::{CodeIndexer, JobState};
use codelens_index::qdrant_ops::QdrantOps;
use codelens_index::retriever::Retriever;
use codelens_index::sqlite_store::SqliteVectorStore;
use codelens_index::store::{SearchResult, VectorIndex};
use codelens_index::vector_store::VectorStore;
use codelens_llm::ollama::OllamaProvider;
use codelens_llm::{LexicalReranker, Reranker, embed_fn};

use crate::config::{Config, RerankBackend, StorageBackend, resolve_config_path};

#[derive(Parser)]
#[command(name = "codelens")]
#[command(about = "Semantic search and question answering over a source tree")]
#[command(version)]
struct Cli {
    /// Path to config file (default: config/default.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Collection name instead of the one derived from the project path
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a project directory
    Index {
        /// Project root
        path: PathBuf,
    },

    /// Search an indexed project
    Search {
        path: PathBuf,
        query: String,

        /// Results to return after reranking
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the result list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from an indexed project
    Ask {
        path: PathBuf,
        question: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show index statistics
    Stats { path: PathBuf },

    /// Delete a project's index
    Delete { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config.validate()?;

    let store = open_store(&config).await?;
    let provider = Arc::new(OllamaProvider::new(
        &config.llm.base_url,
        config.llm.model.clone(),
        config.llm.embedding_model.clone(),
    ));

    match cli.command {
        Command::Index { path } => {
            let root = project_root(&path)?;
            let collection = resolve_collection(&root, cli.collection, &config);
            run_index(&config, store, provider, &root, &collection).await
        }
        Command::Search {
            path,
            query,
            top_k,
            json,
        } => {
            let root = project_root(&path)?;
            let collection = resolve_collection(&root, cli.collection, &config);
            let results = retrieve(&config, store, provider, &collection, &query, top_k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("{}", format_results(&results));
            }
            Ok(())
        }
        Command::Ask {
            path,
            question,
            top_k,
        } => {
            let root = project_root(&path)?;
            let collection = resolve_collection(&root, cli.collection, &config);
            let results = retrieve(
                &config,
                store,
                Arc::clone(&provider),
                &collection,
                &question,
                top_k,
            )
            .await?;
            let timeout = Duration::from_secs(config.timeouts.answer_seconds);
            let reply = answer::answer(provider.as_ref(), &question, &results, timeout)
                .await
                .context("answer synthesis failed")?;
            println!("{reply}");
            Ok(())
        }
        Command::Stats { path } => {
            let root = project_root(&path)?;
            let collection = resolve_collection(&root, cli.collection, &config);
            let stats = VectorIndex::new(store, collection, config.indexer_config().index)
                .stats()
                .await?;
            println!("collection: {}", stats.collection_name);
            println!("records:    {}", stats.total_records);
            println!("storage:    {}", stats.storage_location);
            Ok(())
        }
        Command::Delete { path } => {
            let root = project_root(&path)?;
            let collection = resolve_collection(&root, cli.collection, &config);
            VectorIndex::new(store, collection.clone(), config.indexer_config().index)
                .delete()
                .await?;
            println!("deleted {collection}");
            Ok(())
        }
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn project_root(path: &Path) -> anyhow::Result<PathBuf> {
    let root = std::path::absolute(path)
        .with_context(|| format!("invalid project path {}", path.display()))?;
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    Ok(root)
}

fn resolve_collection(root: &Path, explicit: Option<String>, config: &Config) -> String {
    explicit.unwrap_or_else(|| collection_name(root, &config.storage.collection_prefix))
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("in-memory storage: the index is lost when this process exits");
            Arc::new(InMemoryVectorStore::new())
        }
        StorageBackend::Sqlite => Arc::new(
            SqliteVectorStore::open(&config.storage.path)
                .await
                .with_context(|| format!("failed to open {}", config.storage.path))?,
        ),
        StorageBackend::Qdrant => Arc::new(
            QdrantOps::new(&config.storage.qdrant_url)
                .with_context(|| format!("failed to connect to {}", config.storage.qdrant_url))?,
        ),
    };
    tracing::debug!(location = %store.location(), "vector store ready");
    Ok(store)
}

async fn build_reranker(config: &Config) -> anyhow::Result<Arc<dyn Reranker>> {
    match config.rerank.backend {
        RerankBackend::Lexical => Ok(Arc::new(LexicalReranker)),
        #[cfg(feature = "candle")]
        RerankBackend::CrossEncoder => {
            use codelens_llm::candle_provider::{CrossEncoderReranker, default_device};

            let model = config.rerank.model.clone();
            let reranker = tokio::task::spawn_blocking(move || {
                CrossEncoderReranker::load(&model, &default_device())
            })
            .await?
            .with_context(|| format!("failed to load {}", config.rerank.model))?;
            Ok(Arc::new(reranker))
        }
        #[cfg(not(feature = "candle"))]
        RerankBackend::CrossEncoder => {
            bail!("rerank.backend = \"cross-encoder\" requires building with the `candle` feature")
        }
    }
}

async fn run_index(
    config: &Config,
    store: Arc<dyn VectorStore>,
    provider: Arc<OllamaProvider>,
    root: &Path,
    collection: &str,
) -> anyhow::Result<()> {
    if let Err(e) = provider.health_check().await {
        tracing::warn!("ollama health check failed: {e}");
    }

    let indexer = CodeIndexer::new(store, embed_fn(provider), config.indexer_config());
    let handle = indexer.spawn(root, collection);

    let mut status = handle.subscribe();
    while status.changed().await.is_ok() {
        let snapshot = status.borrow_and_update().clone();
        match &snapshot.state {
            JobState::Pending => tracing::info!(collection, "waiting for another indexing run"),
            JobState::Running => tracing::info!(
                collection,
                files = snapshot.files_scanned,
                progress = %format!("{}/{}", snapshot.fragments_indexed, snapshot.fragments_total),
                "indexing"
            ),
            JobState::Succeeded | JobState::Failed(_) => break,
        }
    }

    let finished = status.borrow().state.clone();
    let report = handle.wait().await.map_err(|e| {
        let message = match finished {
            JobState::Failed(message) => message,
            _ => e.to_string(),
        };
        anyhow::Error::new(e).context(format!("indexing failed: {message}"))
    })?;
    println!(
        "indexed {} fragments from {} files into {} ({} stale removed, {} ms)",
        report.fragments_indexed,
        report.files_scanned,
        report.collection,
        report.fragments_removed,
        report.duration_ms
    );
    Ok(())
}

async fn retrieve(
    config: &Config,
    store: Arc<dyn VectorStore>,
    provider: Arc<OllamaProvider>,
    collection: &str,
    query: &str,
    top_k: Option<usize>,
) -> anyhow::Result<Vec<SearchResult>> {
    let retrieval = config.retrieval_config();
    let top_k = top_k.unwrap_or(retrieval.top_k);
    let index = VectorIndex::new(store, collection, config.indexer_config().index);
    let retriever = Retriever::new(
        index,
        embed_fn(Arc::clone(&provider)),
        Some(provider),
        build_reranker(config).await?,
        retrieval,
    );
    Ok(retriever.retrieve(query, top_k).await?)
}
