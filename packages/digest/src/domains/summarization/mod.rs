//! Full-text summarization.
//!
//! Failures are returned to the caller untouched. The orchestrator contains
//! them per paper; nothing here retries.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::common::utils::render_prompt;
use crate::kernel::{BaseAI, TokenUsage};

/// Placeholder replaced with the paper text in summary prompts.
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Summary prompt used when a user has no custom prompt.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are reviewing a research paper for a daily digest. Read the paper below and write a \
concise Markdown summary with these sections:

### Research question
### Method
### Key findings
### Limitations
### Why it matters

Use short paragraphs or bullet points. Do not wrap the answer in a code block.

Paper:
{text}";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("completion failed: {0}")]
    Completion(#[source] anyhow::Error),

    #[error("completion returned an empty summary")]
    EmptyResponse { usage: TokenUsage },
}

impl SummarizeError {
    /// Tokens spent before the failure, if the provider reported any.
    pub fn usage(&self) -> TokenUsage {
        match self {
            SummarizeError::Completion(_) => TokenUsage::default(),
            SummarizeError::EmptyResponse { usage } => *usage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub markdown: String,
    pub usage: TokenUsage,
}

pub struct Summarizer {
    ai: Arc<dyn BaseAI>,
    model: String,
    temperature: f32,
}

impl Summarizer {
    pub fn new(ai: Arc<dyn BaseAI>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            ai,
            model: model.into(),
            temperature,
        }
    }

    /// Summarize `text` with `custom_prompt`, or the default template.
    pub async fn summarize(
        &self,
        text: &str,
        custom_prompt: Option<&str>,
    ) -> Result<Summary, SummarizeError> {
        let template = custom_prompt.unwrap_or(DEFAULT_PROMPT_TEMPLATE);
        let prompt = render_prompt(template, TEXT_PLACEHOLDER, text);

        info!(text_chars = text.chars().count(), "Requesting summary");

        let completion = self
            .ai
            .complete(&prompt, &self.model, self.temperature)
            .await
            .map_err(SummarizeError::Completion)?;

        let markdown = strip_code_fences(&completion.text);
        if markdown.trim().is_empty() {
            return Err(SummarizeError::EmptyResponse {
                usage: completion.usage,
            });
        }

        info!(summary_chars = markdown.chars().count(), "Summary received");

        Ok(Summary {
            markdown,
            usage: completion.usage,
        })
    }
}

/// Drop lines that open or close a fenced code block, keeping their content.
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
