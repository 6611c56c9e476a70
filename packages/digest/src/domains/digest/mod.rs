//! Daily digest orchestration: fetch, filter, summarize, deliver, record.

pub mod activities;

pub use activities::{process_user, run_daily_digest, run_daily_digest_for, DailyRunSummary, UserRunSummary};
