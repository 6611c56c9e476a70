// AI implementation using OpenAI
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in domain layers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use openai_client::{ChatRequest, OpenAIClient};

use super::{BaseAI, Completion, TokenUsage};

/// OpenAI-compatible implementation of AI capabilities
#[derive(Clone)]
pub struct OpenAIBackend {
    client: OpenAIClient,
}

impl OpenAIBackend {
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        let client = OpenAIClient::new(api_key);
        let client = match base_url {
            Some(url) => client.with_base_url(url),
            None => client,
        };
        Self { client }
    }
}

#[async_trait]
impl BaseAI for OpenAIBackend {
    async fn complete(&self, prompt: &str, model: &str, temperature: f32) -> Result<Completion> {
        tracing::debug!(
            prompt_length = prompt.len(),
            model = model,
            temperature = temperature,
            "Calling completion API"
        );

        let response = self
            .client
            .chat_completion(ChatRequest::user_prompt(model, prompt, temperature))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    model = model,
                    transport = e.is_transport(),
                    "Completion API call failed"
                );
                e
            })
            .context("Failed to call completion API")?;

        let usage = response
            .usage
            .map(|u| TokenUsage::new(i64::from(u.prompt_tokens), i64::from(u.completion_tokens)))
            .unwrap_or_default();

        tracing::info!(
            response_length = response.content.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            model = model,
            "Completion received"
        );

        Ok(Completion {
            text: response.content,
            usage,
        })
    }
}
