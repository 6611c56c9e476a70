//! End-to-end tests for a user's daily run, driven through mocks.

mod common;

use chrono::{TimeZone, Utc};
use common::{paper, papers, today, user, user_with_filter, TestHarness};
use paper_digest::domains::digest::{process_user, run_daily_digest_for};
use paper_digest::kernel::test_dependencies::{
    sample_pdf, MockAI, MockHttpFetcher, MockMailer, MockPaperSource,
};
use paper_digest::kernel::TestDependencies;

#[tokio::test]
async fn no_papers_sends_nothing_and_records_nothing() {
    let harness = TestHarness::new(TestDependencies::new()).await;

    let summary = process_user(&harness.deps, &user("Alice"), today())
        .await
        .unwrap();

    assert_eq!(summary.papers.fetched, 0);
    assert!(!summary.email_sent);
    assert!(!summary.usage_recorded);
    assert!(harness.mocks.mailer.sent().is_empty());
    assert_eq!(harness.mocks.ai.call_count(), 0);
    assert!(harness
        .ledger
        .query_by_date("Alice", today())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn interest_filter_keeps_matching_papers_and_lists_the_rest() {
    let ai = MockAI::new()
        .with_reply_when("FILTER ABSTRACT-1", "Yes, interested.")
        .with_reply_when("FILTER ABSTRACT-3", "yes")
        .with_reply_when("FILTER ABSTRACT-", "No.")
        .with_reply_when("SUMMARIZE", "A concise summary.");
    let mocks = TestDependencies::new()
        .mock_ai(ai)
        .mock_papers(MockPaperSource::new().with_papers(papers(5)));
    let harness = TestHarness::new(mocks).await;

    let summary = process_user(&harness.deps, &user_with_filter("Alice"), today())
        .await
        .unwrap();

    assert_eq!(summary.papers.fetched, 5);
    assert_eq!(summary.papers.filtered, 2);
    assert_eq!(summary.papers.processed, 2);
    assert_eq!(summary.filtered_out, 3);
    assert!(summary.email_sent);

    let sent = harness.mocks.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Daily arXiv Paper Report - Alice");
    assert_eq!(sent[0].recipients, "alice@example.com");

    let body = &sent[0].body;
    assert_eq!(body.matches("### Summary").count(), 2);
    assert!(body.contains("## Paper 1"));
    assert!(body.contains("## Paper 3"));
    assert!(body.contains("## Appendix"));
    assert!(body.contains("### 1. Paper 2"));
    assert!(body.contains("### 2. Paper 4"));
    assert!(body.contains("### 3. Paper 5"));

    // Summaries come before the appendix, in feed order
    let first = body.find("## Paper 1").unwrap();
    let second = body.find("## Paper 3").unwrap();
    let appendix = body.find("## Appendix").unwrap();
    assert!(first < second && second < appendix);

    // Retrieval degraded to the abstract, which the summary prompt received
    assert!(harness.mocks.ai.was_called_with("SUMMARIZE ABSTRACT-1"));
    assert!(!harness.mocks.ai.was_called_with("SUMMARIZE ABSTRACT-2"));

    let record = harness
        .ledger
        .query_by_date("Alice", today())
        .await
        .unwrap()
        .expect("usage should be recorded");
    assert_eq!(record.papers_fetched, 5);
    assert_eq!(record.papers_filtered, 2);
    assert_eq!(record.papers_processed, 2);
    assert_eq!(record.filter_input_tokens, 500);
    assert_eq!(record.filter_output_tokens, 100);
    assert_eq!(record.generate_input_tokens, 200);
    assert_eq!(record.total_tokens, 840);
    assert_eq!(record.arxiv_categories, vec!["q-fin.ST".to_string()]);

    let report_path = summary.report_path.expect("report should be saved");
    assert!(report_path.ends_with("Alice/report.md"));
    assert_eq!(std::fs::read_to_string(report_path).unwrap(), *body);
}

#[tokio::test]
async fn downloaded_pdf_text_reaches_the_summarizer() {
    let body = "full text ".repeat(150);
    let pdf = sample_pdf(&[body.trim()]).unwrap();
    let mocks = TestDependencies::new()
        .mock_fetcher(MockHttpFetcher::new().with_body(pdf))
        .mock_papers(MockPaperSource::new().with_papers(papers(1)));
    let harness = TestHarness::new(mocks).await;

    let summary = process_user(&harness.deps, &user("Alice"), today())
        .await
        .unwrap();

    assert_eq!(summary.papers.processed, 1);
    assert!(harness.mocks.ai.was_called_with("full text full text"));
    assert!(!harness.mocks.ai.was_called_with("ABSTRACT-1"));
    assert_eq!(
        harness.mocks.fetcher.calls(),
        vec!["https://arxiv.org/pdf/2401.01001v1.pdf".to_string()]
    );
}

#[tokio::test]
async fn summarizer_failure_is_isolated_to_its_paper() {
    let ai = MockAI::new()
        .with_failure_when("SUMMARIZE ABSTRACT-2")
        .with_reply_when("SUMMARIZE", "Fine summary.");
    let mocks = TestDependencies::new()
        .mock_ai(ai)
        .mock_papers(MockPaperSource::new().with_papers(papers(3)));
    let harness = TestHarness::new(mocks).await;

    let summary = process_user(&harness.deps, &user("Alice"), today())
        .await
        .unwrap();

    assert_eq!(summary.papers.processed, 2);
    assert_eq!(summary.failed, 1);

    let body = &harness.mocks.mailer.sent()[0].body;
    assert!(body.contains("**Failed to process paper**: [Paper 2]"));
    assert_eq!(body.matches("### Summary").count(), 2);
    assert!(!body.contains("## Appendix"));

    let notice = body.find("Paper 2").unwrap();
    assert!(body.find("## Paper 1").unwrap() < notice);
    assert!(notice < body.find("## Paper 3").unwrap());

    let record = harness
        .ledger
        .query_by_date("Alice", today())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.papers_processed, 2);
    assert_eq!(record.filter_total_tokens, 0);
}

#[tokio::test]
async fn everything_filtered_sends_appendix_only() {
    let ai = MockAI::new().with_reply_when("FILTER", "No.");
    let mocks = TestDependencies::new()
        .mock_ai(ai)
        .mock_papers(MockPaperSource::new().with_papers(papers(3)));
    let harness = TestHarness::new(mocks).await;

    let summary = process_user(&harness.deps, &user_with_filter("Alice"), today())
        .await
        .unwrap();

    assert_eq!(summary.papers.filtered, 0);
    assert_eq!(summary.filtered_out, 3);
    assert!(summary.email_sent);
    assert!(summary.report_path.is_none());
    assert_eq!(harness.mocks.ai.call_count(), 3);

    let body = &harness.mocks.mailer.sent()[0].body;
    assert!(body.starts_with("===="));
    assert!(!body.contains("### Summary"));
    assert!(body.contains("### 3. Paper 3"));

    let record = harness
        .ledger
        .query_by_date("Alice", today())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.papers_fetched, 3);
    assert_eq!(record.papers_filtered, 0);
    assert_eq!(record.papers_processed, 0);
    assert_eq!(record.filter_input_tokens, 300);
    assert_eq!(record.generate_total_tokens, 0);
}

#[tokio::test]
async fn ambiguous_verdict_keeps_the_paper() {
    let ai = MockAI::new()
        .with_reply_when("FILTER ABSTRACT-1", "Hard to say.")
        .with_failure_when("FILTER ABSTRACT-2");
    let mocks = TestDependencies::new()
        .mock_ai(ai)
        .mock_papers(MockPaperSource::new().with_papers(papers(2)));
    let harness = TestHarness::new(mocks).await;

    let summary = process_user(&harness.deps, &user_with_filter("Alice"), today())
        .await
        .unwrap();

    assert_eq!(summary.papers.filtered, 2);
    assert_eq!(summary.filtered_out, 0);
    assert_eq!(summary.papers.processed, 2);
}

#[tokio::test]
async fn verdict_with_both_keyword_sets_keeps_the_paper() {
    let ai = MockAI::new()
        .with_reply_when("FILTER ABSTRACT-1", "Not interested.")
        .with_reply_when("FILTER ABSTRACT-2", "不感兴趣")
        .with_reply_when("FILTER ABSTRACT-3", "no");
    let mocks = TestDependencies::new()
        .mock_ai(ai)
        .mock_papers(MockPaperSource::new().with_papers(papers(3)));
    let harness = TestHarness::new(mocks).await;

    let summary = process_user(&harness.deps, &user_with_filter("Alice"), today())
        .await
        .unwrap();

    assert_eq!(summary.papers.filtered, 2);
    assert_eq!(summary.filtered_out, 1);

    let body = &harness.mocks.mailer.sent()[0].body;
    assert!(body.contains("## Paper 1"));
    assert!(body.contains("## Paper 2"));
    assert!(body.contains("### 1. Paper 3"));
}

#[tokio::test]
async fn paper_cap_limits_summaries() {
    let mocks = TestDependencies::new()
        .mock_papers(MockPaperSource::new().with_papers(papers(5)));
    let harness = TestHarness::with_cap(mocks, Some(2)).await;

    let summary = process_user(&harness.deps, &user("Alice"), today())
        .await
        .unwrap();

    assert_eq!(summary.papers.fetched, 5);
    assert_eq!(summary.papers.processed, 2);
    assert_eq!(harness.mocks.ai.call_count(), 2);
    assert!(harness.mocks.ai.was_called_with("ABSTRACT-1"));
    assert!(harness.mocks.ai.was_called_with("ABSTRACT-2"));
    assert!(!harness.mocks.ai.was_called_with("ABSTRACT-3"));
}

#[tokio::test]
async fn failed_delivery_still_saves_report_and_usage() {
    let mocks = TestDependencies::new()
        .mock_mailer(MockMailer::failing())
        .mock_papers(MockPaperSource::new().with_papers(papers(1)));
    let harness = TestHarness::new(mocks).await;

    let summary = process_user(&harness.deps, &user("Alice"), today())
        .await
        .unwrap();

    assert!(!summary.email_sent);
    assert_eq!(harness.mocks.mailer.sent().len(), 1);

    let path = summary.report_path.expect("report should be saved");
    assert!(std::fs::read_to_string(path).unwrap().contains("## Paper 1"));
    assert!(summary.usage_recorded);
    assert!(harness
        .ledger
        .query_by_date("Alice", today())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn papers_before_target_date_are_skipped() {
    let mut old = paper(9);
    old.published_at = Utc.with_ymd_and_hms(2024, 1, 8, 23, 59, 0).unwrap();
    let mocks = TestDependencies::new()
        .mock_papers(MockPaperSource::new().with_papers(vec![paper(1), old]));
    let harness = TestHarness::new(mocks).await;

    let summary = process_user(&harness.deps, &user("Alice"), today())
        .await
        .unwrap();

    assert_eq!(summary.papers.fetched, 1);
    assert_eq!(summary.papers.processed, 1);
    assert!(!harness.mocks.ai.was_called_with("ABSTRACT-9"));
}

#[tokio::test]
async fn rerun_on_the_same_day_replaces_the_ledger_row() {
    let mocks = TestDependencies::new()
        .mock_papers(MockPaperSource::new().with_papers(papers(2)));
    let harness = TestHarness::new(mocks).await;
    let alice = user("Alice");

    process_user(&harness.deps, &alice, today()).await.unwrap();
    process_user(&harness.deps, &alice, today()).await.unwrap();

    let records = harness
        .ledger
        .query_range("Alice", today(), today())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].papers_processed, 2);
    assert_eq!(records[0].generate_input_tokens, 200);
}

#[tokio::test]
async fn daily_job_continues_past_failing_users() {
    let mocks = TestDependencies::new().mock_papers(MockPaperSource::failing("arXiv is down"));
    let harness = TestHarness::new(mocks).await;
    let users = vec![user("Alice"), user("Bob")];

    let summary = run_daily_digest_for(&harness.deps, &users, today()).await;

    assert_eq!(summary.users, 2);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 2);
    assert_eq!(harness.mocks.papers.calls().len(), 2);
    assert!(harness.mocks.mailer.sent().is_empty());
}

#[tokio::test]
async fn daily_job_runs_each_user_independently() {
    let ai = MockAI::new()
        .with_reply_when("FILTER", "no")
        .with_reply_when("SUMMARIZE", "Summary.");
    let mocks = TestDependencies::new()
        .mock_ai(ai)
        .mock_papers(MockPaperSource::new().with_papers(papers(2)));
    let harness = TestHarness::new(mocks).await;
    let users = vec![user_with_filter("Alice"), user("Bob")];

    let summary = run_daily_digest_for(&harness.deps, &users, today()).await;
    assert_eq!(summary.succeeded, 2);

    let sent = harness.mocks.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(!sent[0].body.contains("### Summary"));
    assert_eq!(sent[1].body.matches("### Summary").count(), 2);

    let rows = harness.ledger.query_all_by_date(today()).await.unwrap();
    let names: Vec<_> = rows.iter().map(|r| r.user_name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob"]);
}
