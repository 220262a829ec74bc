//! Query-time retrieval: embed the query, search the store.

use std::sync::Arc;

use crate::embedding::{embed_query, EmbeddingClient};
use crate::error::{PipelineError, Result};
use crate::models::RetrievedPassage;
use crate::store::VectorStore;

/// Composes an embedding client with a vector store. The two must agree
/// on dimensionality; that is checked once at construction so a
/// mismatched pairing fails before the first query.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>) -> Result<Self> {
        if embedder.dims() != store.dims() {
            return Err(PipelineError::Config(format!(
                "embedding model '{}' produces {} dims but the collection expects {}",
                embedder.model_name(),
                embedder.dims(),
                store.dims()
            )));
        }
        Ok(Self { embedder, store })
    }

    /// Return up to `top_k` passages most similar to `query`, best first.
    /// An empty collection yields an empty list.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>> {
        if top_k == 0 {
            return Err(PipelineError::Config("top_k must be > 0".into()));
        }

        let embedding = embed_query(self.embedder.as_ref(), query).await?;
        self.store.query(&embedding, top_k).await
    }
}
