// arXiv search client
//
// Infrastructure implementation of BasePaperSource over the public Atom API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use feed_rs::model::Entry;

use super::BasePaperSource;
use crate::domains::papers::Paper;

pub const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

pub struct ArxivPaperSource {
    client: reqwest::Client,
    api_url: String,
}

impl ArxivPaperSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("paper-digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create arXiv HTTP client")?;

        Ok(Self {
            client,
            api_url: ARXIV_API_URL.to_string(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl BasePaperSource for ArxivPaperSource {
    async fn fetch_papers(&self, categories: &[String], max_results: usize) -> Result<Vec<Paper>> {
        let search_query = build_search_query(categories);
        let max_results_param = max_results.to_string();
        tracing::info!(query = %search_query, max_results = max_results, "Searching arXiv");

        let bytes = self
            .client
            .get(&self.api_url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
                ("max_results", max_results_param.as_str()),
            ])
            .send()
            .await
            .context("arXiv request failed")?
            .error_for_status()
            .context("arXiv returned an error status")?
            .bytes()
            .await
            .context("Failed to read arXiv response")?;

        let papers = parse_feed(&bytes)?;
        tracing::info!(count = papers.len(), "arXiv search returned papers");
        Ok(papers)
    }
}

/// `cat:A OR cat:B ...` over the non-blank categories.
pub fn build_search_query(categories: &[String]) -> String {
    categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| format!("cat:{}", c))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Parse an arXiv Atom response into papers, keeping feed order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Paper>> {
    let feed = feed_rs::parser::parse(bytes).context("Failed to parse arXiv Atom feed")?;

    Ok(feed.entries.into_iter().filter_map(entry_to_paper).collect())
}

fn entry_to_paper(entry: Entry) -> Option<Paper> {
    let Some(published_at) = entry.published.or(entry.updated) else {
        tracing::warn!(id = %entry.id, "arXiv entry has no date, skipping");
        return None;
    };

    let canonical_url = entry.id.trim().to_string();
    let pdf_url = entry
        .links
        .iter()
        .find(|l| {
            l.title.as_deref() == Some("pdf")
                || l.media_type.as_deref() == Some("application/pdf")
        })
        .map(|l| l.href.clone())
        .unwrap_or_else(|| canonical_url.replace("/abs/", "/pdf/"));

    let categories: Vec<String> = entry.categories.iter().map(|c| c.term.clone()).collect();

    Some(Paper {
        title: collapse_whitespace(&entry.title.map(|t| t.content).unwrap_or_default()),
        pdf_url,
        abstract_text: collapse_whitespace(&entry.summary.map(|t| t.content).unwrap_or_default()),
        authors: entry.authors.into_iter().map(|p| p.name).collect(),
        published_at,
        // feed-rs drops <arxiv:primary_category>; arXiv lists the primary
        // category first among the <category> elements.
        primary_category: categories.first().cloned(),
        categories,
        canonical_url,
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
