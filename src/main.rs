//! # Issue Pilot CLI (`pilot`)
//!
//! The `pilot` binary drives the issue-support pipeline: chunking issue
//! documents into records, indexing records into the vector store, and
//! answering questions grounded in the indexed issues.
//!
//! ## Usage
//!
//! ```bash
//! pilot --config ./config/pilot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pilot chunk` | Split issue documents into chunk record files |
//! | `pilot index` | Embed chunk records and upsert them into the store |
//! | `pilot ask "<question>"` | Answer a question from the indexed issues |
//! | `pilot tool list` | List the agent tools this binary ships |
//! | `pilot tool run <name>` | Invoke one agent tool with parameters |
//!
//! ## Examples
//!
//! ```bash
//! # Chunk fetched issues into records
//! pilot chunk --input-dir ./data/issues --output-dir ./data/chunks
//!
//! # Embed and index the records
//! pilot index --data-dir ./data/chunks
//!
//! # Ask a grounded question
//! pilot ask "why does my replica stay in recovery?"
//!
//! # Search log files through the agent tool
//! pilot tool run log_searcher --param 'pattern=ERROR.*recovery'
//! ```

mod chunker;
mod config;
mod embedding;
mod error;
mod indexer;
mod llm;
mod models;
mod pipeline;
mod prompt;
mod retriever;
mod store;
mod tools;
mod writer;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::retriever::Retriever;
use crate::store::sqlite::SqliteCollection;
use crate::store::VectorStore;
use crate::tools::{
    tool_descriptors, ConfigValidatorTool, DocRetrieverTool, LogSearcherTool, SummarizerTool,
    Tool, ToolRegistry,
};

/// Issue Pilot — retrieval-augmented question answering over GitHub
/// issue archives.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pilot.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pilot",
    about = "Issue Pilot — retrieval-augmented question answering over GitHub issue archives",
    version,
    long_about = "Issue Pilot chunks GitHub issue documents into deterministic records, embeds \
    them into a local SQLite vector store, and answers support questions with citation-numbered \
    context retrieved from the indexed issues."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pilot.toml`. Store, chunking, embedding, and
    /// LLM settings are read from this file.
    #[arg(long, global = true, default_value = "./config/pilot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Split issue documents into chunk record files.
    ///
    /// Reads `*.json` issue documents from the input directory, chunks
    /// the title+body and each comment into overlapping token windows,
    /// and writes one record file per chunk. Re-running over unchanged
    /// documents rewrites identical files.
    Chunk {
        /// Directory of issue document JSON files.
        #[arg(long)]
        input_dir: PathBuf,

        /// Directory to write chunk record files into.
        #[arg(long)]
        output_dir: PathBuf,

        /// Override chunking.chunk_size from config (tokens per chunk).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override chunking.overlap from config (tokens shared between
        /// consecutive chunks).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Embed chunk records and upsert them into the vector store.
    ///
    /// Records whose text is unchanged since the last run are skipped.
    /// A failed embedding batch is logged and skipped; the run fails only
    /// if every batch fails.
    Index {
        /// Directory of chunk record files produced by `pilot chunk`.
        #[arg(long)]
        data_dir: PathBuf,

        /// Override embedding.batch_size from config (texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Answer a question grounded in the indexed issues.
    ///
    /// Retrieves the most similar chunks, builds a citation-numbered
    /// prompt, and prints the model's answer.
    Ask {
        /// The question to answer.
        query: String,

        /// Override retrieval.top_k from config (passages to retrieve).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Agent tool management.
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },
}

/// Tool subcommands.
#[derive(Subcommand)]
enum ToolAction {
    /// List the agent tools this binary ships.
    List,

    /// Invoke one agent tool.
    ///
    /// Parameters are passed as `--param key=value` pairs; values that
    /// parse as JSON (numbers, booleans) are passed through typed.
    Run {
        /// Tool name (see `pilot tool list`).
        name: String,

        /// Tool parameters as `key=value` pairs.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

/// Parse a `key=value` pair for `--param` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn params_to_json(params: Vec<(String, String)>) -> Value {
    let mut map = serde_json::Map::new();
    for (key, value) in params {
        let parsed = serde_json::from_str::<Value>(&value)
            .unwrap_or_else(|_| Value::String(value.clone()));
        map.insert(key, parsed);
    }
    Value::Object(map)
}

async fn open_store(cfg: &Config, dims: usize, model: &str) -> anyhow::Result<Arc<dyn VectorStore>> {
    let collection = SqliteCollection::open(
        &cfg.store.persist_dir,
        &cfg.store.collection,
        model,
        dims,
    )
    .await?;
    Ok(Arc::new(collection))
}

/// Construct every tool with its live dependencies. The registry holds
/// the same tool set `pilot tool list` advertises.
async fn build_registry(cfg: &Config) -> anyhow::Result<ToolRegistry> {
    let embedder = embedding::create_client(&cfg.embedding)?;
    let store = open_store(cfg, embedder.dims(), embedder.model_name()).await?;
    let retriever = Retriever::new(embedder, store)?;
    let completer = llm::create_client(&cfg.llm)?;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(DocRetrieverTool::new(
        retriever,
        cfg.retrieval.top_k,
    )));
    registry.register(Box::new(LogSearcherTool::new(cfg.tools.log_dir.clone())));
    registry.register(Box::new(ConfigValidatorTool));
    registry.register(Box::new(SummarizerTool::new(completer)));

    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Tool {
            action: ToolAction::List,
        } => {
            for descriptor in tool_descriptors() {
                println!("{:<18} {}", descriptor.name, descriptor.description);
            }
            return Ok(());
        }
        Commands::Chunk {
            input_dir,
            output_dir,
            chunk_size,
            overlap,
        } => {
            // Chunking needs no store or network; fall back to defaults
            // when the config file is absent. A config that exists but
            // fails to parse or validate is still fatal.
            let cfg = if cli.config.exists() {
                config::load_config(&cli.config)?
            } else {
                Config::minimal()
            };
            let summary = writer::run_chunk(
                input_dir,
                output_dir,
                chunk_size.unwrap_or(cfg.chunking.chunk_size),
                overlap.unwrap_or(cfg.chunking.overlap),
            )?;
            println!("Chunking complete:");
            println!("  documents:      {}", summary.documents);
            println!("  skipped:        {}", summary.skipped);
            println!("  chunks written: {}", summary.chunks_written);
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Chunk { .. } | Commands::Tool { action: ToolAction::List } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Index {
            data_dir,
            batch_size,
        } => {
            let embedder = embedding::create_client(&cfg.embedding)?;
            let store = open_store(&cfg, embedder.dims(), embedder.model_name()).await?;
            let summary = indexer::run_index(
                &data_dir,
                embedder,
                store.clone(),
                batch_size.unwrap_or(cfg.embedding.batch_size),
            )
            .await?;
            println!("Indexing complete:");
            println!("  records seen:   {}", summary.records_seen);
            println!("  malformed:      {}", summary.records_malformed);
            println!("  unchanged:      {}", summary.records_unchanged);
            println!("  indexed:        {}", summary.entries_indexed);
            println!("  failed batches: {}", summary.batches_failed);
            println!("  store entries:  {}", store.count().await?);
        }
        Commands::Ask { query, top_k } => {
            let embedder = embedding::create_client(&cfg.embedding)?;
            let store = open_store(&cfg, embedder.dims(), embedder.model_name()).await?;
            let retriever = Retriever::new(embedder, store)?;
            let completer = llm::create_client(&cfg.llm)?;
            let pipeline = pipeline::RagPipeline::new(
                retriever,
                completer,
                top_k.unwrap_or(cfg.retrieval.top_k),
            );

            let answer = pipeline.answer(&query).await?;
            println!("{}", answer);
        }
        Commands::Tool { action } => match action {
            ToolAction::Run { name, params } => {
                let registry = build_registry(&cfg).await?;
                let tool = registry.find(&name).ok_or_else(|| {
                    anyhow::anyhow!(
                        "unknown tool '{}'; run `pilot tool list` to see available tools",
                        name
                    )
                })?;
                let result = tool.execute(params_to_json(params)).await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            ToolAction::List => {
                // Handled above (before config loading)
                unreachable!()
            }
        },
    }

    Ok(())
}
