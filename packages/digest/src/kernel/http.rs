// HTTP fetcher using reqwest
//
// Infrastructure implementation of BaseHttpFetcher for paper downloads.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{BaseHttpFetcher, FetchedBody};

/// Per-request timeout for paper downloads.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("paper-digest/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl BaseHttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchedBody> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {}", url))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .context("Failed to read response body")?
            .to_vec();

        tracing::debug!(url = %url, status = status, size = bytes.len(), "Fetched URL");

        Ok(FetchedBody {
            status,
            content_type,
            bytes,
        })
    }
}
