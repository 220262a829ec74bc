//! In-memory [`VectorStore`] implementation for tests.
//!
//! A `Vec` of entries behind `std::sync::RwLock`; queries are brute-force
//! cosine similarity with the same ordering contract as the SQLite
//! backend.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{PipelineError, Result};
use crate::models::RetrievedPassage;

use super::{IndexedEntry, VectorStore};

pub struct InMemoryStore {
    dims: usize,
    entries: RwLock<Vec<IndexedEntry>>,
}

impl InMemoryStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn upsert(&self, new_entries: &[IndexedEntry]) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        for entry in new_entries {
            if entry.embedding.len() != self.dims {
                return Err(PipelineError::Config(format!(
                    "entry {} has {} dims, collection expects {}",
                    entry.chunk_id,
                    entry.embedding.len(),
                    self.dims
                )));
            }
            entries.retain(|e| e.chunk_id != entry.chunk_id);
            entries.push(entry.clone());
        }
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedPassage>> {
        if embedding.len() != self.dims {
            return Err(PipelineError::Config(format!(
                "query embedding has {} dims, collection expects {}",
                embedding.len(),
                self.dims
            )));
        }

        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(f32, &IndexedEntry)> = entries
            .iter()
            .map(|e| (cosine_similarity(embedding, &e.embedding), e))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(_, e)| RetrievedPassage {
                text: e.text.clone(),
                issue_number: e.issue_number,
                source: e.source,
            })
            .collect())
    }

    async fn entry_hash(&self, chunk_id: &str) -> Result<Option<String>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .iter()
            .find(|e| e.chunk_id == chunk_id)
            .map(|e| e.text_hash.clone()))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.entries.read().unwrap().len() as u64)
    }
}
