//! TOML configuration loading and validation.
//!
//! All commands read a single config file (`--config`, default
//! `./config/pilot.toml`). Validation happens up front in [`load_config`]
//! so that bad parameters fail before any network call or store write.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding the vector-store database.
    pub persist_dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "issue_support".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    300
}
fn default_overlap() -> usize {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for self-hosted providers (Ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_output_tokens() -> usize {
    512
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Defaults for commands that never touch the store or the network
    /// (chunking works without a config file on disk).
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                persist_dir: PathBuf::from("./vector_store"),
                collection: default_collection(),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ToolsConfig {
    /// Directory scanned by the log_searcher tool.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::Config(format!("failed to read config file {}: {}", path.display(), e))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| PipelineError::Config(format!("failed to parse config file: {}", e)))?;

    validate(&config)?;
    Ok(config)
}

/// Reject invalid parameters before any I/O happens.
pub fn validate(config: &Config) -> Result<()> {
    validate_chunking(config.chunking.chunk_size, config.chunking.overlap)?;

    if config.retrieval.top_k == 0 {
        return Err(PipelineError::Config("retrieval.top_k must be > 0".into()));
    }

    if config.embedding.batch_size == 0 {
        return Err(PipelineError::Config(
            "embedding.batch_size must be > 0".into(),
        ));
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {}
        other => {
            return Err(PipelineError::Config(format!(
                "unknown embedding provider: '{}'. Must be openai or ollama.",
                other
            )))
        }
    }

    if config.embedding.model.is_none() {
        return Err(PipelineError::Config(format!(
            "embedding.model must be specified for provider '{}'",
            config.embedding.provider
        )));
    }
    match config.embedding.dims {
        None | Some(0) => {
            return Err(PipelineError::Config(format!(
                "embedding.dims must be > 0 for provider '{}'",
                config.embedding.provider
            )))
        }
        Some(_) => {}
    }

    if config.llm.provider != "openai" {
        return Err(PipelineError::Config(format!(
            "unknown llm provider: '{}'. Must be openai.",
            config.llm.provider
        )));
    }
    if config.llm.max_output_tokens == 0 {
        return Err(PipelineError::Config(
            "llm.max_output_tokens must be > 0".into(),
        ));
    }

    Ok(())
}

/// Shared with the chunker: a window must always advance.
pub fn validate_chunking(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(PipelineError::Config("chunking.chunk_size must be > 0".into()));
    }
    if overlap >= chunk_size {
        return Err(PipelineError::Config(format!(
            "chunking.overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}
