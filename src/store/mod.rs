//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers exactly what the indexer and retriever
//! need: idempotent upsert keyed by chunk id, nearest-neighbor query, and
//! a staleness lookup. Backends: SQLite ([`sqlite::SqliteCollection`])
//! for persistence, [`memory::InMemoryStore`] for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RetrievedPassage, SourceKind};

/// One row of the vector collection: a chunk, its embedding, and its
/// provenance metadata. The `text_hash` lets re-indexing skip entries
/// whose text is unchanged.
#[derive(Debug, Clone)]
pub struct IndexedEntry {
    pub chunk_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub issue_number: i64,
    pub source: SourceKind,
    pub text_hash: String,
}

/// A cosine-metric vector collection with fixed dimensionality.
///
/// Upserts are insert-or-overwrite by `chunk_id`; indexing the same chunk
/// set twice leaves the entry count unchanged. Queries return up to
/// `top_k` passages in descending-similarity order with ties broken by
/// `chunk_id`, so rank is deterministic for a fixed store state.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embedding dimensionality fixed when the collection was created.
    fn dims(&self) -> usize;

    /// Insert or overwrite entries keyed by chunk id.
    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<()>;

    /// Nearest-neighbor search. An empty collection yields an empty
    /// result, not an error.
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedPassage>>;

    /// The stored text hash for a chunk id, if the entry exists.
    async fn entry_hash(&self, chunk_id: &str) -> Result<Option<String>>;

    /// Number of entries in the collection.
    async fn count(&self) -> Result<u64>;
}
