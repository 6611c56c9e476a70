//! Token usage query tool
//!
//! Reads the usage ledger and prints per-user, per-day, and aggregate views.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{CommandFactory, Parser};
use colored::Colorize;
use paper_digest::config::database_url_from_env;
use paper_digest::domains::usage::{DateRange, UsageLedger, UsageRecord, UsageTotals};

#[derive(Parser)]
#[command(name = "query-usage")]
#[command(about = "Query token usage recorded by the paper digest")]
struct Cli {
    /// User name to query
    #[arg(long)]
    user: Option<String>,

    /// Show the user's record for today
    #[arg(long, requires = "user")]
    today: bool,

    /// Number of days to cover, ending today
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    days: Option<u32>,

    /// Show every user's record for today
    #[arg(long, conflicts_with_all = ["user", "summary"])]
    all_today: bool,

    /// Per-user aggregate table, optionally limited with --days
    #[arg(long, conflicts_with = "user")]
    summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let ledger = UsageLedger::connect(&database_url_from_env())
        .await
        .context("Failed to open usage ledger")?;
    let today = Utc::now().date_naive();

    if cli.all_today {
        return all_users_today(&ledger, today).await;
    }
    if cli.summary {
        return all_users_summary(&ledger, today, cli.days).await;
    }

    match (cli.user.as_deref(), cli.days) {
        (Some(user), Some(days)) if !cli.today => user_range(&ledger, user, today, days).await,
        (Some(user), _) => user_today(&ledger, user, today).await,
        (None, _) => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

async fn user_today(ledger: &UsageLedger, user: &str, today: NaiveDate) -> Result<()> {
    match ledger.query_by_date(user, today).await? {
        Some(record) => {
            print_title(&format!("[{}] token usage for {}", user, today));
            print_record(&record);
        }
        None => println!(
            "{}",
            format!("No record for user {} on {}", user, today).yellow()
        ),
    }
    Ok(())
}

async fn user_range(ledger: &UsageLedger, user: &str, today: NaiveDate, days: u32) -> Result<()> {
    let range = DateRange::last_days(today, days);
    let records = ledger.query_range(user, range.start, range.end).await?;

    if records.is_empty() {
        println!(
            "{}",
            format!("No records for user {} in that period", user).yellow()
        );
        return Ok(());
    }

    print_title(&format!(
        "[{}] token usage from {} to {}",
        user, range.start, range.end
    ));
    for record in &records {
        print_record(record);
    }

    let totals = ledger.aggregate_by_user(user, Some(range)).await?;
    println!("{}", format!("Summary: last {} days", days).bold().underline());
    print_totals(&totals);
    print_field("Average daily cost", format_cost(totals.average_daily_cost(days)));
    println!();

    Ok(())
}

async fn all_users_today(ledger: &UsageLedger, today: NaiveDate) -> Result<()> {
    let records = ledger.query_all_by_date(today).await?;

    if records.is_empty() {
        println!("{}", "No records for today".yellow());
        return Ok(());
    }

    print_title(&format!("Token usage for all users on {}", today));
    for record in &records {
        print_record(record);
    }

    let total_tokens: i64 = records.iter().map(|r| r.total_tokens).sum();
    let total_cost: f64 = records.iter().map(|r| r.total_cost).sum();

    println!("{}", "Today's totals".bold().underline());
    print_field("Users", records.len().to_string());
    print_field("Total tokens", format_count(total_tokens));
    print_field("Total cost", format_cost(total_cost));
    println!();

    Ok(())
}

async fn all_users_summary(ledger: &UsageLedger, today: NaiveDate, days: Option<u32>) -> Result<()> {
    let range = days.map(|days| DateRange::last_days(today, days));
    let summaries = ledger.aggregate_all_users(range).await?;

    if summaries.is_empty() {
        println!("{}", "No usage recorded".yellow());
        return Ok(());
    }

    match range {
        Some(range) => print_title(&format!(
            "All users from {} to {}",
            range.start, range.end
        )),
        None => print_title("All users, all time"),
    }

    println!(
        "{:<20} {:<28} {:>6} {:>14} {:>12} {:>8} {:>8} {:>9}",
        "User".bold(),
        "Email".bold(),
        "Days".bold(),
        "Tokens".bold(),
        "Cost".bold(),
        "Fetched".bold(),
        "Kept".bold(),
        "Processed".bold()
    );

    let mut grand = UsageTotals::default();
    for summary in &summaries {
        let t = &summary.totals;
        println!(
            "{:<20} {:<28} {:>6} {:>14} {:>12} {:>8} {:>8} {:>9}",
            summary.user_name.cyan(),
            summary.user_email,
            t.record_count,
            format_count(t.total_tokens),
            format_cost(t.total_cost),
            t.papers_fetched,
            t.papers_filtered,
            t.papers_processed
        );

        grand.total_tokens += t.total_tokens;
        grand.total_cost += t.total_cost;
        grand.filter_cost += t.filter_cost;
        grand.generate_cost += t.generate_cost;
        grand.papers_fetched += t.papers_fetched;
        grand.papers_filtered += t.papers_filtered;
        grand.papers_processed += t.papers_processed;
        grand.record_count += t.record_count;
    }

    println!();
    println!("{}", "Grand totals".bold().underline());
    print_field("Users", summaries.len().to_string());
    print_totals(&grand);
    println!();

    Ok(())
}

fn print_title(title: &str) {
    println!("{}", title.bright_green().bold());
    println!();
}

fn print_field(label: &str, value: String) {
    println!("  {:<22} {}", label.cyan(), value);
}

fn print_section(label: &str) {
    println!("  {}", label.bold());
}

fn print_record(record: &UsageRecord) {
    print_field("User", record.user_name.clone());
    print_field("Email", record.user_email.clone());
    print_field("Date", record.date.to_string());
    print_field("Categories", record.arxiv_categories.join(", "));

    print_section("Papers");
    print_field("Fetched", record.papers_fetched.to_string());
    print_field("Passed filter", record.papers_filtered.to_string());
    print_field("Processed", record.papers_processed.to_string());

    print_section("Filter stage");
    print_field("Input tokens", format_count(record.filter_input_tokens));
    print_field("Output tokens", format_count(record.filter_output_tokens));
    print_field("Total tokens", format_count(record.filter_total_tokens));
    print_field("Cost", format_cost(record.filter_cost));

    print_section("Summary stage");
    print_field("Input tokens", format_count(record.generate_input_tokens));
    print_field("Output tokens", format_count(record.generate_output_tokens));
    print_field("Total tokens", format_count(record.generate_total_tokens));
    print_field("Cost", format_cost(record.generate_cost));

    print_section("Total");
    print_field("Tokens", format_count(record.total_tokens));
    print_field("Cost", format_cost(record.total_cost).bold().to_string());
    println!();
}

fn print_totals(totals: &UsageTotals) {
    print_field("Recorded days", totals.record_count.to_string());
    print_field("Total tokens", format_count(totals.total_tokens));
    print_field("Total cost", format_cost(totals.total_cost));
    print_field("Filter cost", format_cost(totals.filter_cost));
    print_field("Summary cost", format_cost(totals.generate_cost));
    print_field("Papers fetched", totals.papers_fetched.to_string());
    print_field("Papers kept", totals.papers_filtered.to_string());
    print_field("Papers processed", totals.papers_processed.to_string());
}

fn format_cost(cost: f64) -> String {
    format!("{:.4}", cost)
}

/// `1234567` → `1,234,567`
fn format_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
        assert_eq!(format_count(-4200), "-4,200");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["query-usage", "--user", "alice", "--days", "7"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("alice"));
        assert_eq!(cli.days, Some(7));

        assert!(Cli::try_parse_from(["query-usage", "--today"]).is_err());
        assert!(Cli::try_parse_from(["query-usage", "--all-today", "--user", "bob"]).is_err());
        assert!(Cli::try_parse_from(["query-usage", "--summary", "--days", "0"]).is_err());
    }
}
