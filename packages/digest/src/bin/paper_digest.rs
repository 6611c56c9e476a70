//! Daily arXiv digest runner
//!
//! Runs the digest once at startup, then on the configured cron schedule
//! until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use paper_digest::config::{load_users, Config};
use paper_digest::domains::digest::run_daily_digest;
use paper_digest::domains::retrieval::ContentRetriever;
use paper_digest::domains::usage::UsageLedger;
use paper_digest::kernel::{
    start_scheduler, ArxivPaperSource, CommandRenderer, DigestDeps, OpenAIBackend, ReqwestFetcher,
    SmtpMailer, SmtpSettings,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "paper-digest")]
#[command(about = "Daily arXiv paper digest: filter, summarize, and email new papers")]
struct Cli {
    /// Run a single pass over all users and exit
    #[arg(long)]
    once: bool,

    /// Do not run immediately at startup; wait for the first schedule tick
    #[arg(long, conflicts_with = "once")]
    skip_initial_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,paper_digest=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let users = load_users(&config.users_config_path)?;
    tracing::info!(
        users = users.len(),
        path = %config.users_config_path.display(),
        "Loaded user configuration"
    );

    let ledger = UsageLedger::connect(&config.database_url)
        .await
        .context("Failed to open usage ledger")?;

    let fetcher = Arc::new(ReqwestFetcher::new()?);
    let renderer = Arc::new(CommandRenderer::new(config.html_to_pdf_command.clone()));
    let mailer = SmtpMailer::new(SmtpSettings {
        server: config.smtp_server.clone(),
        port: config.smtp_port,
        sender: config.smtp_sender.clone(),
        password: config.smtp_password.clone(),
    });

    let deps = DigestDeps::new(
        Arc::new(OpenAIBackend::new(
            config.openai_api_key.clone(),
            config.openai_base_url.as_deref(),
        )),
        Arc::new(ArxivPaperSource::new()?),
        Arc::new(mailer),
        Arc::new(ContentRetriever::arxiv(fetcher, renderer)),
        ledger,
        config.digest_settings(),
    );

    if cli.once {
        let summary = run_daily_digest(&deps, &users).await;
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Single run finished"
        );
        return Ok(());
    }

    if !cli.skip_initial_run {
        run_daily_digest(&deps, &users).await;
    }

    let mut scheduler = start_scheduler(&config.daily_schedule, deps, Arc::new(users))
        .await
        .context("Failed to start scheduler")?;

    tracing::info!("Waiting for scheduled runs (Ctrl-C to stop)");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down");
    scheduler.shutdown().await?;

    Ok(())
}
