//! Completion client for answer generation.
//!
//! Generation is deliberately deterministic: temperature is pinned to
//! 0.0 and the output is capped by `llm.max_output_tokens`, so the same
//! prompt against the same model yields a stable answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{PipelineError, Result};

/// A text-in, text-out completion capability.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;
    /// Produce a completion for `prompt`. Returns the trimmed answer text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the configured completion client.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        other => Err(PipelineError::Config(format!(
            "unknown llm provider: {}",
            other
        ))),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Completion client for the OpenAI `POST /v1/chat/completions` endpoint.
///
/// Requires `OPENAI_API_KEY` in the environment, checked at construction.
/// Retries follow the same policy as the embedding clients: 429 and 5xx
/// back off exponentially, other 4xx fail immediately.
pub struct OpenAiChat {
    api_key: String,
    model: String,
    max_output_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| PipelineError::Config("OPENAI_API_KEY environment variable not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens as u32,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            max_tokens: self.max_output_tokens,
        };

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: ChatResponse = response.json().await.map_err(|e| {
                            PipelineError::GenerationService(format!(
                                "invalid response body: {}",
                                e
                            ))
                        })?;
                        return extract_answer(parsed);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(PipelineError::GenerationService(format!(
                            "OpenAI API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    return Err(PipelineError::GenerationService(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(PipelineError::GenerationService(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| PipelineError::GenerationService("completion failed after retries".into())))
    }
}

fn extract_answer(response: ChatResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| PipelineError::GenerationService("response contained no choices".into()))?;

    Ok(content.trim().to_string())
}
