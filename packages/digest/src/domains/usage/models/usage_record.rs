use chrono::NaiveDate;

use crate::kernel::TokenUsage;

/// Tokens and cost for one pipeline stage (interest filter or summary).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: f64,
}

impl StageUsage {
    pub fn total_tokens(&self) -> i64 {
        self.input_tokens + self.output_tokens
    }

    pub(crate) fn add(&mut self, usage: TokenUsage, cost: f64) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.cost += cost;
    }
}

/// Paper counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaperCounts {
    pub fetched: i64,
    /// Papers that passed the interest filter.
    pub filtered: i64,
    /// Papers that were fully summarized.
    pub processed: i64,
}

/// What a run writes to the ledger. Totals are derived, never supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEntry {
    pub user_name: String,
    pub user_email: String,
    pub date: NaiveDate,
    pub arxiv_categories: Vec<String>,
    pub filter: StageUsage,
    pub generate: StageUsage,
    pub papers: PaperCounts,
}

impl UsageEntry {
    pub fn total_input_tokens(&self) -> i64 {
        self.filter.input_tokens + self.generate.input_tokens
    }

    pub fn total_output_tokens(&self) -> i64 {
        self.filter.output_tokens + self.generate.output_tokens
    }

    pub fn total_tokens(&self) -> i64 {
        self.filter.total_tokens() + self.generate.total_tokens()
    }

    pub fn total_cost(&self) -> f64 {
        self.filter.cost + self.generate.cost
    }
}

/// A stored ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub id: i64,
    pub user_name: String,
    pub user_email: String,
    pub date: NaiveDate,
    pub arxiv_categories: Vec<String>,
    pub filter_input_tokens: i64,
    pub filter_output_tokens: i64,
    pub filter_total_tokens: i64,
    pub filter_cost: f64,
    pub generate_input_tokens: i64,
    pub generate_output_tokens: i64,
    pub generate_total_tokens: i64,
    pub generate_cost: f64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub papers_fetched: i64,
    pub papers_filtered: i64,
    pub papers_processed: i64,
    pub created_at: String,
}

/// Summed counters over a set of rows. All zero when no rows matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageTotals {
    pub total_tokens: i64,
    pub total_cost: f64,
    pub filter_cost: f64,
    pub generate_cost: f64,
    pub papers_fetched: i64,
    pub papers_filtered: i64,
    pub papers_processed: i64,
    pub record_count: i64,
}

impl UsageTotals {
    /// Mean cost per calendar day over a `days`-day window, counting days
    /// without a record as zero.
    pub fn average_daily_cost(&self, days: u32) -> f64 {
        if days == 0 {
            0.0
        } else {
            self.total_cost / f64::from(days)
        }
    }
}

/// Per-user aggregate across users.
#[derive(Debug, Clone, PartialEq)]
pub struct UserUsageSummary {
    pub user_name: String,
    pub user_email: String,
    pub totals: UsageTotals,
}

/// Inclusive date range for aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days ending at `end`, inclusive.
    pub fn last_days(end: NaiveDate, days: u32) -> Self {
        let span = u64::from(days.max(1) - 1);
        let start = end
            .checked_sub_days(chrono::Days::new(span))
            .unwrap_or(end);
        Self { start, end }
    }
}
