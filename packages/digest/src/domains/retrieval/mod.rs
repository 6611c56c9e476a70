//! Content retrieval: turn a paper reference into plain text.
//!
//! Strategies run in order and the first one producing enough text wins:
//!
//! ```text
//! PdfStrategy  ──(< MIN_TEXT_CHARS or error)──► HtmlStrategy ──(same)──► abstract
//! ```
//!
//! Every failure inside a strategy is logged and treated as "strategy failed".
//! [`ContentRetriever::retrieve`] always returns text.

pub mod html;
pub mod pdf;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::domains::papers::Paper;
use crate::kernel::{BaseHtmlRenderer, BaseHttpFetcher};

pub use html::{flatten_html, html_url, HtmlStrategy};
pub use pdf::{download_pdf, extract_pdf_text, resolve_pdf_url, PdfStrategy, RetryPolicy};

/// Maximum characters handed to the summarizer.
pub const MAX_TEXT_CHARS: usize = 129_024;

/// A strategy must produce at least this many characters to be accepted.
pub const MIN_TEXT_CHARS: usize = 1000;

/// Why a single strategy produced no usable text.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("downloaded file too small ({size} bytes)")]
    TooSmall { size: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parse error: {0}")]
    Pdf(String),

    #[error("HTML to PDF conversion failed: {0}")]
    Render(String),
}

/// One way of getting text for a paper.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs ("pdf", "html").
    fn name(&self) -> &'static str;

    /// Extract text, writing any intermediate files under `workspace`.
    async fn extract(&self, paper: &Paper, workspace: &Path) -> Result<String, RetrievalError>;
}

/// Where the returned text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Strategy(&'static str),
    Abstract,
}

/// Best-effort paper text.
#[derive(Debug, Clone)]
pub struct RetrievedText {
    pub text: String,
    pub source: TextSource,
    pub truncated: bool,
}

/// Multi-strategy text retriever with abstract fallback.
pub struct ContentRetriever {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    min_chars: usize,
    max_chars: usize,
}

impl ContentRetriever {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self {
            strategies,
            min_chars: MIN_TEXT_CHARS,
            max_chars: MAX_TEXT_CHARS,
        }
    }

    /// PDF first, then the HTML rendering.
    pub fn arxiv(fetcher: Arc<dyn BaseHttpFetcher>, renderer: Arc<dyn BaseHtmlRenderer>) -> Self {
        Self::new(vec![
            Box::new(PdfStrategy::new(fetcher.clone())),
            Box::new(HtmlStrategy::new(fetcher, renderer)),
        ])
    }

    /// Override the output cap.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Retrieve text for `paper`. Never fails; degrades to the abstract.
    pub async fn retrieve(&self, paper: &Paper, workspace: &Path) -> RetrievedText {
        let mut chosen = None;

        for strategy in &self.strategies {
            match strategy.extract(paper, workspace).await {
                Ok(text) => {
                    let chars = text.trim().chars().count();
                    if chars >= self.min_chars {
                        info!(
                            paper = %paper.title,
                            strategy = strategy.name(),
                            chars = chars,
                            "Extracted paper text"
                        );
                        chosen = Some((text, TextSource::Strategy(strategy.name())));
                        break;
                    }
                    warn!(
                        paper = %paper.title,
                        strategy = strategy.name(),
                        chars = chars,
                        "Extracted text too short, trying next strategy"
                    );
                }
                Err(e) => {
                    warn!(
                        paper = %paper.title,
                        strategy = strategy.name(),
                        error = %e,
                        "Text extraction failed, trying next strategy"
                    );
                }
            }
        }

        let (text, source) = chosen.unwrap_or_else(|| {
            warn!(paper = %paper.title, "All strategies failed, using abstract");
            (paper.abstract_text.clone(), TextSource::Abstract)
        });

        let (text, truncated) = truncate_chars(text, self.max_chars);
        if truncated {
            warn!(
                paper = %paper.title,
                max_chars = self.max_chars,
                "Paper text too long, truncated"
            );
        }

        RetrievedText {
            text,
            source,
            truncated,
        }
    }
}

/// Keep the first `max_chars` characters of `text`.
pub fn truncate_chars(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut text = text;
            text.truncate(byte_idx);
            (text, true)
        }
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStrategy {
        name: &'static str,
        result: fn() -> Result<String, RetrievalError>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExtractionStrategy for FixedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn extract(&self, _paper: &Paper, _workspace: &Path) -> Result<String, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn strategy(
        name: &'static str,
        result: fn() -> Result<String, RetrievalError>,
    ) -> (Box<dyn ExtractionStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(FixedStrategy {
                name,
                result,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    fn paper() -> Paper {
        Paper {
            title: "A Paper".into(),
            canonical_url: "http://arxiv.org/abs/2401.00001v1".into(),
            pdf_url: "http://arxiv.org/pdf/2401.00001v1".into(),
            abstract_text: "The abstract, verbatim.".into(),
            authors: vec!["Ada".into()],
            published_at: Utc::now(),
            categories: vec!["cs.AI".into()],
            primary_category: Some("cs.AI".into()),
        }
    }

    #[tokio::test]
    async fn test_first_sufficient_strategy_wins() {
        let (pdf, pdf_calls) = strategy("pdf", || Ok("p".repeat(MIN_TEXT_CHARS)));
        let (html, html_calls) = strategy("html", || Ok("h".repeat(5000)));
        let retriever = ContentRetriever::new(vec![pdf, html]);

        let out = retriever.retrieve(&paper(), Path::new(".")).await;

        assert_eq!(out.source, TextSource::Strategy("pdf"));
        assert_eq!(out.text.len(), MIN_TEXT_CHARS);
        assert_eq!(pdf_calls.load(Ordering::SeqCst), 1);
        assert_eq!(html_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_short_or_failed_strategy_falls_through() {
        let (pdf, _) = strategy("pdf", || Err(RetrievalError::TooSmall { size: 12 }));
        let (html, _) = strategy("html", || Ok("h".repeat(2000)));
        let retriever = ContentRetriever::new(vec![pdf, html]);

        let out = retriever.retrieve(&paper(), Path::new(".")).await;

        assert_eq!(out.source, TextSource::Strategy("html"));
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn test_all_short_strategies_fall_back_to_abstract() {
        let (pdf, _) = strategy("pdf", || Ok("x".repeat(MIN_TEXT_CHARS - 1)));
        let (html, _) = strategy("html", || Ok("   \n  ".to_string()));
        let retriever = ContentRetriever::new(vec![pdf, html]);

        let out = retriever.retrieve(&paper(), Path::new(".")).await;

        assert_eq!(out.source, TextSource::Abstract);
        assert_eq!(out.text, "The abstract, verbatim.");
    }

    #[tokio::test]
    async fn test_whitespace_padding_does_not_count_towards_minimum() {
        let (pdf, _) = strategy("pdf", || Ok(format!("{}{}", " ".repeat(2000), "short")));
        let retriever = ContentRetriever::new(vec![pdf]);

        let out = retriever.retrieve(&paper(), Path::new(".")).await;

        assert_eq!(out.source, TextSource::Abstract);
    }

    #[tokio::test]
    async fn test_long_text_is_truncated_to_prefix() {
        fn long() -> Result<String, RetrievalError> {
            let mut text = "a".repeat(MAX_TEXT_CHARS);
            text.push_str("OVERFLOW");
            Ok(text)
        }
        let (pdf, _) = strategy("pdf", long);
        let retriever = ContentRetriever::new(vec![pdf]);

        let out = retriever.retrieve(&paper(), Path::new(".")).await;

        assert!(out.truncated);
        assert_eq!(out.text.chars().count(), MAX_TEXT_CHARS);
        assert!(out.text.chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_truncate_chars_respects_multibyte_boundaries() {
        let (text, truncated) = truncate_chars("论文摘要".to_string(), 2);
        assert!(truncated);
        assert_eq!(text, "论文");

        let (text, truncated) = truncate_chars("short".to_string(), 10);
        assert!(!truncated);
        assert_eq!(text, "short");
    }
}
