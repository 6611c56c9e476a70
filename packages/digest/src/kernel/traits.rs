// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (what to prompt for, when to fall back) lives in domains/.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseMailer)

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::domains::papers::Paper;

// =============================================================================
// AI Trait (Infrastructure - Generic LLM completion)
// =============================================================================

/// Prompt/completion token counts reported for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl TokenUsage {
    pub fn new(input_tokens: i64, output_tokens: i64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> i64 {
        self.input_tokens + self.output_tokens
    }
}

/// Raw completion text plus what it cost in tokens.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Complete a single user prompt with the given model and temperature
    async fn complete(&self, prompt: &str, model: &str, temperature: f32) -> Result<Completion>;
}

// =============================================================================
// Delivery Trait (Infrastructure - email)
// =============================================================================

#[async_trait]
pub trait BaseMailer: Send + Sync {
    /// Deliver a Markdown report. `recipients` may be a comma-separated list.
    ///
    /// Returns `false` on any failure; there is no per-recipient result.
    async fn deliver(&self, subject: &str, markdown_body: &str, recipients: &str) -> bool;
}

// =============================================================================
// Paper Source Trait (Infrastructure - preprint search)
// =============================================================================

#[async_trait]
pub trait BasePaperSource: Send + Sync {
    /// Papers in any of `categories`, newest submission first.
    async fn fetch_papers(&self, categories: &[String], max_results: usize) -> Result<Vec<Paper>>;
}

// =============================================================================
// HTTP Fetch Trait (Infrastructure - raw downloads)
// =============================================================================

/// Status and body of a completed GET request.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchedBody {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[async_trait]
pub trait BaseHttpFetcher: Send + Sync {
    /// GET a URL. Transport failures and timeouts are errors; HTTP error
    /// statuses are returned in the body so callers decide on retries.
    async fn get(&self, url: &str) -> Result<FetchedBody>;
}

// =============================================================================
// HTML Renderer Trait (Infrastructure - external HTML→PDF process)
// =============================================================================

#[async_trait]
pub trait BaseHtmlRenderer: Send + Sync {
    /// Render the HTML file at `html_path` into a PDF at `pdf_path`.
    async fn render_pdf(&self, html_path: &Path, pdf_path: &Path) -> Result<()>;
}
