//! HTML strategy: fetch the HTML rendering of a paper, try converting it to
//! PDF for cleaner text, and otherwise flatten the markup.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use tracing::{info, warn};

use super::pdf::extract_pdf_text_blocking;
use super::{ExtractionStrategy, RetrievalError, MIN_TEXT_CHARS};
use crate::common::utils::unique_label;
use crate::domains::papers::{arxiv_id_from_url, Paper};
use crate::kernel::{BaseHtmlRenderer, BaseHttpFetcher};

/// HTML rendering URL for a paper.
pub fn html_url(paper: &Paper) -> String {
    match arxiv_id_from_url(&paper.canonical_url) {
        Some(id) => format!("https://arxiv.org/html/{}", id),
        None => paper.canonical_url.replace(".pdf", ".html"),
    }
}

/// Visible text of an HTML document, one text run per line.
///
/// Script, style, and noscript content is dropped; lines are trimmed, runs of
/// two or more spaces split a line, and blank lines are removed.
pub fn flatten_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut runs: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style" | "noscript"))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            runs.push(trimmed);
        }
    }

    runs.iter()
        .flat_map(|run| run.lines())
        .flat_map(|line| line.trim().split("  "))
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct HtmlStrategy {
    fetcher: Arc<dyn BaseHttpFetcher>,
    renderer: Arc<dyn BaseHtmlRenderer>,
}

impl HtmlStrategy {
    pub fn new(fetcher: Arc<dyn BaseHttpFetcher>, renderer: Arc<dyn BaseHtmlRenderer>) -> Self {
        Self { fetcher, renderer }
    }

    /// Render to PDF and extract; `None` when conversion fails or yields too little.
    async fn text_via_pdf(&self, html_path: &Path, pdf_path: &Path) -> Option<String> {
        if let Err(e) = self.renderer.render_pdf(html_path, pdf_path).await {
            warn!(error = %e, "HTML to PDF conversion failed");
            return None;
        }
        info!(path = %pdf_path.display(), "Converted HTML to PDF");

        let bytes = match tokio::fs::read(pdf_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Rendered PDF could not be read");
                return None;
            }
        };

        match extract_pdf_text_blocking(bytes).await {
            Ok(text) if text.trim().chars().count() >= MIN_TEXT_CHARS => Some(text),
            Ok(_) => {
                info!("Rendered PDF produced too little text, flattening HTML instead");
                None
            }
            Err(e) => {
                warn!(error = %e, "Rendered PDF could not be parsed");
                None
            }
        }
    }
}

#[async_trait]
impl ExtractionStrategy for HtmlStrategy {
    fn name(&self) -> &'static str {
        "html"
    }

    async fn extract(&self, paper: &Paper, workspace: &Path) -> Result<String, RetrievalError> {
        let url = html_url(paper);
        info!(url = %url, paper = %paper.title, "Fetching paper HTML");

        let body = self
            .fetcher
            .get(&url)
            .await
            .map_err(|e| RetrievalError::Http(e.to_string()))?;
        if !body.is_ok() {
            return Err(RetrievalError::Status {
                status: body.status,
                url,
            });
        }

        let label = unique_label(&paper.title, &paper.canonical_url);
        let html_path = workspace.join(format!("{}_temp.html", label));
        let pdf_path = workspace.join(format!("{}_from_html.pdf", label));
        tokio::fs::write(&html_path, &body.bytes).await?;

        if let Some(text) = self.text_via_pdf(&html_path, &pdf_path).await {
            return Ok(text);
        }

        let text = flatten_html(&String::from_utf8_lossy(&body.bytes));
        info!(chars = text.chars().count(), "Extracted text from HTML");
        Ok(text)
    }
}
