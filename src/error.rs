//! Error taxonomy for the RAG pipeline.
//!
//! Configuration problems are fatal and surface before any network call;
//! a malformed document or chunk record is local to that one file; service
//! errors are transient and safe to retry by re-running the command
//! (indexing is resumable because upserts are idempotent).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid parameters or credentials. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single malformed document or chunk record. The caller skips the
    /// offending file and continues.
    #[error("malformed record {path}: {reason}")]
    IngestionFormat { path: PathBuf, reason: String },

    /// Embedding service failure after retries were exhausted (or a
    /// non-retryable API error).
    #[error("embedding service: {0}")]
    EmbeddingService(String),

    /// Language-model service failure after retries were exhausted (or a
    /// non-retryable API error).
    #[error("generation service: {0}")]
    GenerationService(String),

    /// Vector store read/write failure.
    #[error("vector store: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Store(e.to_string())
    }
}
