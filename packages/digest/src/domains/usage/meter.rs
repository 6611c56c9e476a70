//! Per-run token and cost accumulation.

use chrono::NaiveDate;

use super::models::{PaperCounts, StageUsage, UsageEntry};
use crate::kernel::TokenUsage;

/// Price per million tokens, in whatever currency the operator uses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Pricing {
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn cost(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 * self.input_per_million
            + usage.output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Accumulates filter and summary usage for one user's run.
#[derive(Debug, Clone)]
pub struct UsageMeter {
    filter_pricing: Pricing,
    generate_pricing: Pricing,
    filter: StageUsage,
    generate: StageUsage,
    calls: u32,
}

impl UsageMeter {
    pub fn new(filter_pricing: Pricing, generate_pricing: Pricing) -> Self {
        Self {
            filter_pricing,
            generate_pricing,
            filter: StageUsage::default(),
            generate: StageUsage::default(),
            calls: 0,
        }
    }

    /// Count one classifier call, including failed ones.
    pub fn record_filter(&mut self, usage: TokenUsage) {
        self.filter.add(usage, self.filter_pricing.cost(usage));
        self.calls += 1;
    }

    /// Count one summarizer call, including failed ones.
    pub fn record_generate(&mut self, usage: TokenUsage) {
        self.generate.add(usage, self.generate_pricing.cost(usage));
        self.calls += 1;
    }

    /// Whether any AI call was attempted this run.
    pub fn has_calls(&self) -> bool {
        self.calls > 0
    }

    pub fn filter(&self) -> StageUsage {
        self.filter
    }

    pub fn generate(&self) -> StageUsage {
        self.generate
    }

    pub fn into_entry(
        self,
        user_name: &str,
        user_email: &str,
        date: NaiveDate,
        arxiv_categories: &[String],
        papers: PaperCounts,
    ) -> UsageEntry {
        UsageEntry {
            user_name: user_name.to_string(),
            user_email: user_email.to_string(),
            date,
            arxiv_categories: arxiv_categories.to_vec(),
            filter: self.filter,
            generate: self.generate,
            papers,
        }
    }
}
