//! One user's daily run.
//!
//! ```text
//! fetch ─► published_since(target) ─► interest filter? ─► cap
//!       ─► for each paper: retrieve ─► summarize (failure → notice)
//!       ─► assemble + appendix ─► email ─► report.md ─► ledger
//! ```
//!
//! Paper-level failures become notices in the report. Anything else
//! (paper search, work directory, ledger) fails the user and is handled by
//! the daily loop.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::config::UserConfig;
use crate::domains::classification::InterestClassifier;
use crate::domains::papers::{published_since, target_date, Paper};
use crate::domains::reports::{
    assemble_report, failure_notice, paper_section, report_subject, user_work_dir, write_report,
};
use crate::domains::summarization::{SummarizeError, Summarizer};
use crate::domains::usage::{PaperCounts, UsageMeter};
use crate::kernel::DigestDeps;

/// What happened during one user's run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRunSummary {
    pub papers: PaperCounts,
    /// Papers dropped by the interest filter (listed in the appendix).
    pub filtered_out: usize,
    /// Papers replaced by a failure notice.
    pub failed: usize,
    pub email_sent: bool,
    pub report_path: Option<PathBuf>,
    pub usage_recorded: bool,
}

/// Run the digest pipeline for `user` as of `today` (UTC date).
pub async fn process_user(
    deps: &DigestDeps,
    user: &UserConfig,
    today: NaiveDate,
) -> Result<UserRunSummary> {
    let settings = &deps.settings;
    info!(user = %user.name, categories = ?user.arxiv_categories, "Processing user");

    let user_dir = user_work_dir(&settings.work_dir, &user.name).await?;

    let since = target_date(today, settings.days_lookback);
    let fetched = deps
        .papers
        .fetch_papers(&user.arxiv_categories, settings.max_results)
        .await
        .with_context(|| format!("Failed to fetch papers for {}", user.name))?;
    let papers = published_since(fetched, since);

    let mut summary = UserRunSummary::default();
    summary.papers.fetched = papers.len() as i64;
    info!(user = %user.name, target_date = %since, papers = papers.len(), "Fetched papers");

    if papers.is_empty() {
        info!(user = %user.name, "No new papers, nothing to report");
        return Ok(summary);
    }

    let mut meter = UsageMeter::new(settings.filter_pricing, settings.generate_pricing);

    let (kept, filtered_out) = match user.interest_filter() {
        Some(template) => filter_by_interest(deps, papers, template, &mut meter).await,
        None => (papers, Vec::new()),
    };
    summary.papers.filtered = kept.len() as i64;
    summary.filtered_out = filtered_out.len();

    if kept.is_empty() {
        info!(
            user = %user.name,
            filtered_out = filtered_out.len(),
            "No papers passed the interest filter, sending appendix only"
        );
        let report = assemble_report(&[], &filtered_out);
        summary.email_sent = deps
            .mailer
            .deliver(&report_subject(&user.name), &report, &user.email)
            .await;
        summary.usage_recorded = record_usage(deps, user, today, meter, summary.papers).await?;
        return Ok(summary);
    }

    let kept = apply_cap(kept, settings.max_papers_per_user);

    let summarizer = Summarizer::new(
        deps.ai.clone(),
        settings.model.clone(),
        settings.summary_temperature,
    );

    let mut sections = Vec::with_capacity(kept.len());
    for paper in &kept {
        match summarize_paper(deps, &summarizer, paper, &user_dir, user.summary_prompt(), &mut meter)
            .await
        {
            Ok(section) => {
                summary.papers.processed += 1;
                sections.push(section);
            }
            Err(e) => {
                error!(user = %user.name, paper = %paper.title, error = %e, "Failed to process paper");
                summary.failed += 1;
                sections.push(failure_notice(paper, &e));
            }
        }
    }

    let report = assemble_report(&sections, &filtered_out);

    summary.email_sent = deps
        .mailer
        .deliver(&report_subject(&user.name), &report, &user.email)
        .await;
    if summary.email_sent {
        info!(user = %user.name, recipients = %user.email, "Report delivered");
    } else {
        warn!(user = %user.name, "Report was not delivered, saving artifact anyway");
    }

    match write_report(&user_dir, &report).await {
        Ok(path) => {
            info!(user = %user.name, path = %path.display(), "Report saved");
            summary.report_path = Some(path);
        }
        Err(e) => error!(user = %user.name, error = %e, "Failed to save report"),
    }

    summary.usage_recorded = record_usage(deps, user, today, meter, summary.papers).await?;

    info!(
        user = %user.name,
        fetched = summary.papers.fetched,
        filtered = summary.papers.filtered,
        processed = summary.papers.processed,
        failed = summary.failed,
        "Finished user"
    );

    Ok(summary)
}

/// Split papers into (kept, filtered out), preserving order. Fail-open.
async fn filter_by_interest(
    deps: &DigestDeps,
    papers: Vec<Paper>,
    template: &str,
    meter: &mut UsageMeter,
) -> (Vec<Paper>, Vec<Paper>) {
    let classifier = InterestClassifier::new(
        deps.ai.clone(),
        deps.settings.model.clone(),
        deps.settings.filter_temperature,
    );

    info!(papers = papers.len(), "Applying interest filter");

    let mut kept = Vec::new();
    let mut filtered_out = Vec::new();
    for paper in papers {
        let classification = classifier.classify(&paper.abstract_text, template).await;
        meter.record_filter(classification.usage);

        if classification.outcome.keeps_paper() {
            info!(paper = %paper.title, "Paper passed interest filter");
            kept.push(paper);
        } else {
            info!(paper = %paper.title, "Paper filtered out");
            filtered_out.push(paper);
        }
    }

    info!(
        kept = kept.len(),
        filtered_out = filtered_out.len(),
        "Interest filter complete"
    );
    (kept, filtered_out)
}

fn apply_cap(mut papers: Vec<Paper>, max_papers: Option<usize>) -> Vec<Paper> {
    if let Some(max) = max_papers.filter(|max| *max > 0) {
        if papers.len() > max {
            info!(max_papers = max, dropped = papers.len() - max, "Applying paper cap");
            papers.truncate(max);
        }
    }
    papers
}

async fn summarize_paper(
    deps: &DigestDeps,
    summarizer: &Summarizer,
    paper: &Paper,
    user_dir: &Path,
    custom_prompt: Option<&str>,
    meter: &mut UsageMeter,
) -> std::result::Result<String, SummarizeError> {
    let retrieved = deps.retriever.retrieve(paper, user_dir).await;

    match summarizer.summarize(&retrieved.text, custom_prompt).await {
        Ok(summary) => {
            meter.record_generate(summary.usage);
            Ok(paper_section(paper, &summary.markdown))
        }
        Err(e) => {
            meter.record_generate(e.usage());
            Err(e)
        }
    }
}

/// Write the run's usage when at least one AI call was made.
async fn record_usage(
    deps: &DigestDeps,
    user: &UserConfig,
    today: NaiveDate,
    meter: UsageMeter,
    papers: PaperCounts,
) -> Result<bool> {
    if !meter.has_calls() {
        return Ok(false);
    }

    let entry = meter.into_entry(&user.name, &user.email, today, &user.arxiv_categories, papers);
    deps.ledger
        .record(&entry)
        .await
        .with_context(|| format!("Failed to record usage for {}", user.name))?;
    Ok(true)
}
