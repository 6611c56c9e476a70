use chrono::{NaiveDate, Utc};
use tracing::{error, info};

use super::process_user::process_user;
use crate::config::UserConfig;
use crate::kernel::DigestDeps;

/// Counts for one pass over all users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyRunSummary {
    pub users: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Run the digest for every user, as of today's UTC date.
pub async fn run_daily_digest(deps: &DigestDeps, users: &[UserConfig]) -> DailyRunSummary {
    run_daily_digest_for(deps, users, Utc::now().date_naive()).await
}

/// Run the digest for every user, one at a time. A failing user is logged
/// and skipped.
pub async fn run_daily_digest_for(
    deps: &DigestDeps,
    users: &[UserConfig],
    today: NaiveDate,
) -> DailyRunSummary {
    info!(users = users.len(), date = %today, "Starting daily digest");

    let mut summary = DailyRunSummary {
        users: users.len(),
        ..DailyRunSummary::default()
    };

    for user in users {
        match process_user(deps, user, today).await {
            Ok(_) => summary.succeeded += 1,
            Err(e) => {
                error!(user = %user.name, error = %format!("{:#}", e), "Failed to process user");
                summary.failed += 1;
            }
        }
    }

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Daily digest complete"
    );
    summary
}
