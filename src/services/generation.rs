//! Answer generation from retrieved context.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::client::wire::{Content, GenerateContentRequest, GenerateContentResponse};
use crate::client::{GeminiClient, model_path};
use crate::error::GenerationError;
use crate::models::{GeminiConfig, GenerationConfig};
use crate::utils::{RetryConfig, retry};

const INSTRUCTIONS: &str = "Answer the question using ONLY the context below. \
If the context does not contain the answer, say that you do not know.";

/// Produces an answer to a question from context passages.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, query: &str, context: &[String]) -> Result<String, GenerationError>;
}

/// Grounded prompt: instructions, then the context passages in order
/// separated by blank lines, then the question.
pub fn build_prompt(query: &str, context: &[String]) -> String {
    format!(
        "{INSTRUCTIONS}\n\nContext:\n{}\n\nQuestion: {query}",
        context.join("\n\n")
    )
}

/// Gemini text generation client.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    api: GeminiClient,
    model: String,
    timeout: Duration,
    fallback_answer: String,
    retry: RetryConfig,
}

impl GenerationClient {
    pub fn new(gemini: &GeminiConfig, config: &GenerationConfig) -> Result<Self, GenerationError> {
        Ok(Self {
            api: GeminiClient::new(gemini)?,
            model: model_path(&config.model),
            timeout: Duration::from_secs(config.timeout_secs),
            fallback_answer: config.fallback_answer.clone(),
            retry: RetryConfig::new(gemini.max_retries),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer text of a response, or the fallback when the model gave none.
    fn answer_from(&self, response: &GenerateContentResponse) -> String {
        if let Some(reason) = response.block_reason() {
            warn!(reason, "prompt blocked by the model");
            return self.fallback_answer.clone();
        }

        response.text().unwrap_or_else(|| {
            warn!(
                candidates = response.candidates.len(),
                finish_reason = response.finish_reason().unwrap_or("none"),
                "model returned no text"
            );
            self.fallback_answer.clone()
        })
    }
}

#[async_trait]
impl Generator for GenerationClient {
    async fn generate(&self, query: &str, context: &[String]) -> Result<String, GenerationError> {
        let url = self.api.endpoint(&self.model, "generateContent");
        let request = GenerateContentRequest {
            contents: vec![Content::user(build_prompt(query, context))],
        };
        debug!(model = %self.model, passages = context.len(), "generating answer");

        let response: GenerateContentResponse = retry(&self.retry, || async {
            self.api
                .post(&url, &request, self.timeout)
                .await
                .map_err(GenerationError::from)
        })
        .await?;

        Ok(self.answer_from(&response))
    }
}
