//! Digest activities: per-user pipeline and the daily loop over users.

mod daily_job;
mod process_user;

pub use daily_job::{run_daily_digest, run_daily_digest_for, DailyRunSummary};
pub use process_user::{process_user, UserRunSummary};
