//! End-to-end question answering.
//!
//! `answer` is strictly retrieve, then prompt, then complete; nothing is
//! cached between calls, so answers reflect the store as it is now.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::llm::CompletionClient;
use crate::prompt::build_prompt;
use crate::retriever::Retriever;

pub struct RagPipeline {
    retriever: Retriever,
    completer: Arc<dyn CompletionClient>,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(retriever: Retriever, completer: Arc<dyn CompletionClient>, top_k: usize) -> Self {
        Self {
            retriever,
            completer,
            top_k,
        }
    }

    /// Answer `query` grounded in the indexed issues.
    ///
    /// An empty collection is not an error: the prompt goes out with an
    /// empty context block and the model is instructed to say it cannot
    /// answer.
    pub async fn answer(&self, query: &str) -> Result<String> {
        let passages = self.retriever.retrieve(query, self.top_k).await?;
        debug!(passages = passages.len(), "retrieved context");

        let prompt = build_prompt(query, &passages);
        self.completer.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClient;
    use crate::error::PipelineError;
    use crate::models::SourceKind;
    use crate::store::memory::InMemoryStore;
    use crate::store::{IndexedEntry, VectorStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ConstantEmbedder;

    #[async_trait]
    impl EmbeddingClient for ConstantEmbedder {
        fn model_name(&self) -> &str {
            "constant"
        }

        fn dims(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Echoes the prompt it was given so tests can inspect it.
    struct RecordingCompleter {
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingCompleter {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for RecordingCompleter {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("stub answer [1]".to_string())
        }
    }

    struct FailingCompleter;

    #[async_trait]
    impl CompletionClient for FailingCompleter {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(PipelineError::GenerationService("unavailable".into()))
        }
    }

    fn entry(chunk_id: &str, text: &str, embedding: Vec<f32>) -> IndexedEntry {
        IndexedEntry {
            chunk_id: chunk_id.to_string(),
            text: text.to_string(),
            embedding,
            issue_number: 42,
            source: SourceKind::Body,
            text_hash: "h".to_string(),
        }
    }

    #[tokio::test]
    async fn test_answer_includes_retrieved_context() {
        let store = Arc::new(InMemoryStore::new(2));
        store
            .upsert(&[entry(
                "issue_42_body_0",
                "restart clears the recovery loop",
                vec![1.0, 0.0],
            )])
            .await
            .unwrap();

        let retriever = Retriever::new(Arc::new(ConstantEmbedder), store).unwrap();
        let completer = Arc::new(RecordingCompleter::new());
        let pipeline = RagPipeline::new(retriever, completer.clone(), 5);

        let answer = pipeline.answer("how do I fix recovery?").await.unwrap();
        assert_eq!(answer, "stub answer [1]");

        let prompts = completer.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[1] (body:42) restart clears the recovery loop"));
        assert!(prompts[0].contains("Question: how do I fix recovery?"));
    }

    #[tokio::test]
    async fn test_answer_with_empty_collection() {
        let store = Arc::new(InMemoryStore::new(2));
        let retriever = Retriever::new(Arc::new(ConstantEmbedder), store).unwrap();
        let completer = Arc::new(RecordingCompleter::new());
        let pipeline = RagPipeline::new(retriever, completer.clone(), 5);

        let answer = pipeline.answer("anything").await.unwrap();
        assert_eq!(answer, "stub answer [1]");

        let prompts = completer.prompts.lock().unwrap();
        assert!(prompts[0].contains("Context:\n\n"));
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let store = Arc::new(InMemoryStore::new(2));
        let retriever = Retriever::new(Arc::new(ConstantEmbedder), store).unwrap();
        let pipeline = RagPipeline::new(retriever, Arc::new(FailingCompleter), 5);

        let err = pipeline.answer("anything").await.unwrap_err();
        assert!(matches!(err, PipelineError::GenerationService(_)));
    }
}
