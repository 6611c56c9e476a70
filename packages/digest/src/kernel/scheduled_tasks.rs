//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! ```text
//! Scheduler (DAILY_SCHEDULE, UTC)
//!     │
//!     └─► run_daily_digest()
//!             └─► For each user → process_user (sequential)
//! ```

use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::UserConfig;
use crate::domains::digest::activities::run_daily_digest;
use crate::kernel::DigestDeps;

/// Start the daily digest job on `schedule` (six-field cron, seconds first)
pub async fn start_scheduler(
    schedule: &str,
    deps: DigestDeps,
    users: Arc<Vec<UserConfig>>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let digest_job = Job::new_async(schedule, move |_uuid, _lock| {
        let deps = deps.clone();
        let users = users.clone();
        Box::pin(async move {
            let summary = run_daily_digest(&deps, &users).await;
            if summary.failed > 0 {
                tracing::error!(
                    failed = summary.failed,
                    users = summary.users,
                    "Daily digest finished with failures"
                );
            }
        })
    })?;

    scheduler.add(digest_job).await?;
    scheduler.start().await?;

    tracing::info!(schedule = %schedule, "Scheduled tasks started (daily digest)");
    Ok(scheduler)
}
