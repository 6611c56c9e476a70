//! Shared harness for pipeline integration tests.
//!
//! Every test gets its own in-memory ledger and temporary work directory.

#![allow(dead_code)]

use chrono::{NaiveDate, TimeZone, Utc};
use paper_digest::config::{DigestSettings, UserConfig};
use paper_digest::domains::papers::Paper;
use paper_digest::domains::usage::UsageLedger;
use paper_digest::kernel::{DigestDeps, TestDependencies};
use tempfile::TempDir;

/// Interest prompt used by the fixtures. Rules match on `FILTER ABSTRACT-<n>`.
pub const FILTER_PROMPT: &str = "FILTER {abstract}";

/// Summary prompt used by the fixtures. Rules match on `SUMMARIZE ABSTRACT-<n>`.
pub const SUMMARY_PROMPT: &str = "SUMMARIZE {text}";

/// A Wednesday; the one-day lookback targets Tuesday 2024-01-09.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

/// A paper published on the target date with abstract `ABSTRACT-<n>`.
pub fn paper(n: usize) -> Paper {
    Paper {
        title: format!("Paper {}", n),
        canonical_url: format!("http://arxiv.org/abs/2401.0100{}v1", n),
        pdf_url: format!("http://arxiv.org/pdf/2401.0100{}v1", n),
        abstract_text: format!("ABSTRACT-{}", n),
        authors: vec!["Ada Lovelace".to_string()],
        published_at: Utc.with_ymd_and_hms(2024, 1, 9, 12, 0, 0).unwrap(),
        categories: vec!["q-fin.ST".to_string()],
        primary_category: Some("q-fin.ST".to_string()),
    }
}

pub fn papers(count: usize) -> Vec<Paper> {
    (1..=count).map(paper).collect()
}

pub fn user(name: &str) -> UserConfig {
    UserConfig {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        arxiv_categories: vec!["q-fin.ST".to_string()],
        custom_prompt: Some(SUMMARY_PROMPT.to_string()),
        interest_filter_prompt: None,
    }
}

pub fn user_with_filter(name: &str) -> UserConfig {
    UserConfig {
        interest_filter_prompt: Some(FILTER_PROMPT.to_string()),
        ..user(name)
    }
}

/// Mocks, their wiring, and the scratch space they run in.
pub struct TestHarness {
    pub mocks: TestDependencies,
    pub deps: DigestDeps,
    pub ledger: UsageLedger,
    pub work_dir: TempDir,
}

impl TestHarness {
    pub async fn new(mocks: TestDependencies) -> Self {
        Self::with_cap(mocks, None).await
    }

    pub async fn with_cap(mocks: TestDependencies, max_papers_per_user: Option<usize>) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let work_dir = tempfile::tempdir().expect("Failed to create work directory");
        let ledger = UsageLedger::in_memory()
            .await
            .expect("Failed to open in-memory ledger");

        let settings = DigestSettings {
            max_papers_per_user,
            work_dir: work_dir.path().to_path_buf(),
            ..DigestSettings::default()
        };
        let deps = mocks.clone().into_deps(ledger.clone(), settings);

        Self {
            mocks,
            deps,
            ledger,
            work_dir,
        }
    }
}
