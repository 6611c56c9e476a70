//! PDF strategy: download the paper's PDF with retries and extract page text.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{ExtractionStrategy, RetrievalError};
use crate::common::utils::unique_label;
use crate::domains::papers::{arxiv_id_from_url, Paper};
use crate::kernel::BaseHttpFetcher;

/// Retry behavior for PDF downloads.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Wait `base_delay * attempt` after a failed attempt.
    pub base_delay: Duration,
    /// Files smaller than this are treated as failed downloads.
    pub min_bytes: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
            min_bytes: 1024,
        }
    }
}

/// Normalize arXiv links to the canonical `https://arxiv.org/pdf/<id>.pdf` form.
pub fn resolve_pdf_url(url: &str) -> String {
    if url.contains("arxiv.org") && !url.ends_with(".pdf") {
        if let Some(id) = arxiv_id_from_url(url) {
            return format!("https://arxiv.org/pdf/{}.pdf", id);
        }
    }
    url.to_string()
}

/// Download `url` into `dest`, retrying on error statuses, transport errors,
/// and undersized files.
pub async fn download_pdf(
    fetcher: &dyn BaseHttpFetcher,
    url: &str,
    dest: &Path,
    policy: RetryPolicy,
) -> Result<Vec<u8>, RetrievalError> {
    let attempts = policy.attempts.max(1);
    let mut last_error = RetrievalError::Http(format!("no attempt made for {}", url));

    for attempt in 1..=attempts {
        debug!(url = %url, attempt = attempt, "Downloading PDF");

        match try_download(fetcher, url, dest, policy.min_bytes).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                warn!(
                    url = %url,
                    attempt = attempt,
                    max_attempts = attempts,
                    error = %e,
                    "PDF download attempt failed"
                );
                last_error = e;
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.base_delay * attempt).await;
        }
    }

    Err(last_error)
}

async fn try_download(
    fetcher: &dyn BaseHttpFetcher,
    url: &str,
    dest: &Path,
    min_bytes: u64,
) -> Result<Vec<u8>, RetrievalError> {
    let body = fetcher
        .get(url)
        .await
        .map_err(|e| RetrievalError::Http(e.to_string()))?;

    if !body.is_ok() {
        return Err(RetrievalError::Status {
            status: body.status,
            url: url.to_string(),
        });
    }

    let looks_like_pdf = body
        .content_type
        .as_deref()
        .map(|ct| ct.to_lowercase().contains("pdf"))
        .unwrap_or(false);
    if !looks_like_pdf && body.bytes.len() < 10_000 {
        warn!(
            url = %url,
            content_type = ?body.content_type,
            "Response may not be a PDF"
        );
    }

    tokio::fs::write(dest, &body.bytes).await?;
    let size = tokio::fs::metadata(dest).await?.len();
    if size < min_bytes {
        return Err(RetrievalError::TooSmall { size });
    }

    Ok(body.bytes)
}

/// Extract text page by page. A page that fails is logged and skipped.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, RetrievalError> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| RetrievalError::Pdf(e.to_string()))?;

    let mut text = String::new();
    for (page_number, _) in document.get_pages() {
        match document.extract_text(&[page_number]) {
            Ok(page_text) => {
                if !page_text.trim().is_empty() {
                    text.push_str(&page_text);
                    text.push('\n');
                }
            }
            Err(e) => {
                warn!(page = page_number, error = %e, "Failed to extract PDF page, skipping");
            }
        }
    }

    Ok(text)
}

/// Parse PDF bytes off the async executor.
pub(crate) async fn extract_pdf_text_blocking(bytes: Vec<u8>) -> Result<String, RetrievalError> {
    tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
        .await
        .map_err(|e| RetrievalError::Pdf(format!("PDF parser aborted: {}", e)))?
}

/// Download the paper PDF and extract its text.
pub struct PdfStrategy {
    fetcher: Arc<dyn BaseHttpFetcher>,
    policy: RetryPolicy,
}

impl PdfStrategy {
    pub fn new(fetcher: Arc<dyn BaseHttpFetcher>) -> Self {
        Self {
            fetcher,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl ExtractionStrategy for PdfStrategy {
    fn name(&self) -> &'static str {
        "pdf"
    }

    async fn extract(&self, paper: &Paper, workspace: &Path) -> Result<String, RetrievalError> {
        let url = resolve_pdf_url(&paper.pdf_url);
        let dest = workspace.join(format!(
            "{}.pdf",
            unique_label(&paper.title, &paper.canonical_url)
        ));

        info!(url = %url, paper = %paper.title, "Fetching paper PDF");
        let bytes = download_pdf(self.fetcher.as_ref(), &url, &dest, self.policy).await?;

        let text = extract_pdf_text_blocking(bytes).await?;
        if text.is_empty() {
            warn!(paper = %paper.title, "No text extracted from PDF");
        }
        Ok(text)
    }
}
