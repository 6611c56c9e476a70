//! SQLite usage ledger.
//!
//! One row per `(user_name, date)`. Writes are upserts so re-running a day
//! replaces that day's row. Every aggregate is computed at query time.

use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use thiserror::Error;
use tracing::info;

use super::models::{DateRange, UsageEntry, UsageRecord, UsageTotals, UserUsageSummary};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored date: {0}")]
    InvalidDate(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Durable per-user, per-day usage store.
///
/// Cloning shares the pool; each concurrent task checks out its own
/// connection.
#[derive(Clone)]
pub struct UsageLedger {
    pool: SqlitePool,
}

impl UsageLedger {
    /// Open (creating if needed) the ledger at `database_url`.
    ///
    /// # Example URLs
    /// - `sqlite://token_usage.db?mode=rwc` - File-based, create if missing
    /// - `sqlite::memory:` - use [`UsageLedger::in_memory`] instead
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Ephemeral ledger (for testing).
    ///
    /// Every SQLite in-memory connection is its own database, so the pool is
    /// pinned to a single connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let ledger = Self { pool };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_token_usage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_name TEXT NOT NULL,
                user_email TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,
                arxiv_categories TEXT NOT NULL DEFAULT '[]',

                filter_input_tokens INTEGER NOT NULL DEFAULT 0,
                filter_output_tokens INTEGER NOT NULL DEFAULT 0,
                filter_total_tokens INTEGER NOT NULL DEFAULT 0,
                filter_cost REAL NOT NULL DEFAULT 0.0,

                generate_input_tokens INTEGER NOT NULL DEFAULT 0,
                generate_output_tokens INTEGER NOT NULL DEFAULT 0,
                generate_total_tokens INTEGER NOT NULL DEFAULT 0,
                generate_cost REAL NOT NULL DEFAULT 0.0,

                total_input_tokens INTEGER NOT NULL DEFAULT 0,
                total_output_tokens INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                total_cost REAL NOT NULL DEFAULT 0.0,

                papers_fetched INTEGER NOT NULL DEFAULT 0,
                papers_filtered INTEGER NOT NULL DEFAULT 0,
                papers_processed INTEGER NOT NULL DEFAULT 0,

                created_at TEXT NOT NULL DEFAULT (datetime('now')),

                UNIQUE(user_name, date)
            );

            CREATE INDEX IF NOT EXISTS idx_user_date ON user_token_usage(user_name, date);
            CREATE INDEX IF NOT EXISTS idx_date ON user_token_usage(date);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert a run's usage. A second write for the same user and date
    /// replaces the first.
    pub async fn record(&self, entry: &UsageEntry) -> Result<()> {
        let categories = serde_json::to_string(&entry.arxiv_categories)?;

        sqlx::query(
            r#"
            INSERT INTO user_token_usage (
                user_name, user_email, date, arxiv_categories,
                filter_input_tokens, filter_output_tokens, filter_total_tokens, filter_cost,
                generate_input_tokens, generate_output_tokens, generate_total_tokens, generate_cost,
                total_input_tokens, total_output_tokens, total_tokens, total_cost,
                papers_fetched, papers_filtered, papers_processed,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(user_name, date) DO UPDATE SET
                user_email = excluded.user_email,
                arxiv_categories = excluded.arxiv_categories,
                filter_input_tokens = excluded.filter_input_tokens,
                filter_output_tokens = excluded.filter_output_tokens,
                filter_total_tokens = excluded.filter_total_tokens,
                filter_cost = excluded.filter_cost,
                generate_input_tokens = excluded.generate_input_tokens,
                generate_output_tokens = excluded.generate_output_tokens,
                generate_total_tokens = excluded.generate_total_tokens,
                generate_cost = excluded.generate_cost,
                total_input_tokens = excluded.total_input_tokens,
                total_output_tokens = excluded.total_output_tokens,
                total_tokens = excluded.total_tokens,
                total_cost = excluded.total_cost,
                papers_fetched = excluded.papers_fetched,
                papers_filtered = excluded.papers_filtered,
                papers_processed = excluded.papers_processed,
                created_at = excluded.created_at
            "#,
        )
        .bind(&entry.user_name)
        .bind(&entry.user_email)
        .bind(format_date(entry.date))
        .bind(&categories)
        .bind(entry.filter.input_tokens)
        .bind(entry.filter.output_tokens)
        .bind(entry.filter.total_tokens())
        .bind(entry.filter.cost)
        .bind(entry.generate.input_tokens)
        .bind(entry.generate.output_tokens)
        .bind(entry.generate.total_tokens())
        .bind(entry.generate.cost)
        .bind(entry.total_input_tokens())
        .bind(entry.total_output_tokens())
        .bind(entry.total_tokens())
        .bind(entry.total_cost())
        .bind(entry.papers.fetched)
        .bind(entry.papers.filtered)
        .bind(entry.papers.processed)
        .execute(&self.pool)
        .await?;

        info!(
            user = %entry.user_name,
            date = %entry.date,
            total_tokens = entry.total_tokens(),
            total_cost = entry.total_cost(),
            "Recorded token usage"
        );

        Ok(())
    }

    /// One user's record for one date.
    pub async fn query_by_date(&self, user_name: &str, date: NaiveDate) -> Result<Option<UsageRecord>> {
        let row = sqlx::query_as::<_, UsageRow>(
            "SELECT * FROM user_token_usage WHERE user_name = ? AND date = ?",
        )
        .bind(user_name)
        .bind(format_date(date))
        .fetch_optional(&self.pool)
        .await?;

        row.map(UsageRow::into_record).transpose()
    }

    /// One user's records with `start <= date <= end`, oldest first.
    pub async fn query_range(
        &self,
        user_name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT * FROM user_token_usage
            WHERE user_name = ? AND date BETWEEN ? AND ?
            ORDER BY date
            "#,
        )
        .bind(user_name)
        .bind(format_date(start))
        .bind(format_date(end))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UsageRow::into_record).collect()
    }

    /// Every user's record for one date, by user name.
    pub async fn query_all_by_date(&self, date: NaiveDate) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query_as::<_, UsageRow>(
            "SELECT * FROM user_token_usage WHERE date = ? ORDER BY user_name",
        )
        .bind(format_date(date))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UsageRow::into_record).collect()
    }

    /// Summed counters for one user, over `range` or all time.
    pub async fn aggregate_by_user(
        &self,
        user_name: &str,
        range: Option<DateRange>,
    ) -> Result<UsageTotals> {
        let row = match range {
            Some(range) => {
                sqlx::query_as::<_, TotalsRow>(&format!(
                    "SELECT {} FROM user_token_usage WHERE user_name = ? AND date BETWEEN ? AND ?",
                    TOTALS_COLUMNS
                ))
                .bind(user_name)
                .bind(format_date(range.start))
                .bind(format_date(range.end))
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, TotalsRow>(&format!(
                    "SELECT {} FROM user_token_usage WHERE user_name = ?",
                    TOTALS_COLUMNS
                ))
                .bind(user_name)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(row.into_totals())
    }

    /// Per-user sums, most expensive first.
    pub async fn aggregate_all_users(&self, range: Option<DateRange>) -> Result<Vec<UserUsageSummary>> {
        let rows = match range {
            Some(range) => {
                sqlx::query_as::<_, UserTotalsRow>(&format!(
                    r#"
                    SELECT user_name, user_email, {}
                    FROM user_token_usage
                    WHERE date BETWEEN ? AND ?
                    GROUP BY user_name, user_email
                    ORDER BY total_cost DESC
                    "#,
                    TOTALS_COLUMNS
                ))
                .bind(format_date(range.start))
                .bind(format_date(range.end))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, UserTotalsRow>(&format!(
                    r#"
                    SELECT user_name, user_email, {}
                    FROM user_token_usage
                    GROUP BY user_name, user_email
                    ORDER BY total_cost DESC
                    "#,
                    TOTALS_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(UserTotalsRow::into_summary).collect())
    }
}

const TOTALS_COLUMNS: &str = r#"
    COALESCE(SUM(total_tokens), 0) AS total_tokens,
    COALESCE(SUM(total_cost), 0.0) AS total_cost,
    COALESCE(SUM(filter_cost), 0.0) AS filter_cost,
    COALESCE(SUM(generate_cost), 0.0) AS generate_cost,
    COALESCE(SUM(papers_fetched), 0) AS papers_fetched,
    COALESCE(SUM(papers_filtered), 0) AS papers_filtered,
    COALESCE(SUM(papers_processed), 0) AS papers_processed,
    COUNT(*) AS record_count
"#;

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct UsageRow {
    id: i64,
    user_name: String,
    user_email: String,
    date: String,
    arxiv_categories: String,
    filter_input_tokens: i64,
    filter_output_tokens: i64,
    filter_total_tokens: i64,
    filter_cost: f64,
    generate_input_tokens: i64,
    generate_output_tokens: i64,
    generate_total_tokens: i64,
    generate_cost: f64,
    total_input_tokens: i64,
    total_output_tokens: i64,
    total_tokens: i64,
    total_cost: f64,
    papers_fetched: i64,
    papers_filtered: i64,
    papers_processed: i64,
    created_at: String,
}

impl UsageRow {
    fn into_record(self) -> Result<UsageRecord> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .map_err(|_| LedgerError::InvalidDate(self.date.clone()))?;
        let arxiv_categories: Vec<String> = serde_json::from_str(&self.arxiv_categories)?;

        Ok(UsageRecord {
            id: self.id,
            user_name: self.user_name,
            user_email: self.user_email,
            date,
            arxiv_categories,
            filter_input_tokens: self.filter_input_tokens,
            filter_output_tokens: self.filter_output_tokens,
            filter_total_tokens: self.filter_total_tokens,
            filter_cost: self.filter_cost,
            generate_input_tokens: self.generate_input_tokens,
            generate_output_tokens: self.generate_output_tokens,
            generate_total_tokens: self.generate_total_tokens,
            generate_cost: self.generate_cost,
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            total_tokens: self.total_tokens,
            total_cost: self.total_cost,
            papers_fetched: self.papers_fetched,
            papers_filtered: self.papers_filtered,
            papers_processed: self.papers_processed,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TotalsRow {
    total_tokens: i64,
    total_cost: f64,
    filter_cost: f64,
    generate_cost: f64,
    papers_fetched: i64,
    papers_filtered: i64,
    papers_processed: i64,
    record_count: i64,
}

impl TotalsRow {
    fn into_totals(self) -> UsageTotals {
        UsageTotals {
            total_tokens: self.total_tokens,
            total_cost: self.total_cost,
            filter_cost: self.filter_cost,
            generate_cost: self.generate_cost,
            papers_fetched: self.papers_fetched,
            papers_filtered: self.papers_filtered,
            papers_processed: self.papers_processed,
            record_count: self.record_count,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserTotalsRow {
    user_name: String,
    user_email: String,
    #[sqlx(flatten)]
    totals: TotalsRow,
}

impl UserTotalsRow {
    fn into_summary(self) -> UserUsageSummary {
        UserUsageSummary {
            user_name: self.user_name,
            user_email: self.user_email,
            totals: self.totals.into_totals(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::usage::models::{PaperCounts, StageUsage};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(user: &str, day: NaiveDate, generate_cost: f64) -> UsageEntry {
        UsageEntry {
            user_name: user.to_string(),
            user_email: format!("{}@example.org", user),
            date: day,
            arxiv_categories: vec!["q-fin.PR".into(), "cs.AI".into()],
            filter: StageUsage {
                input_tokens: 100,
                output_tokens: 5,
                cost: 0.01,
            },
            generate: StageUsage {
                input_tokens: 2000,
                output_tokens: 400,
                cost: generate_cost,
            },
            papers: PaperCounts {
                fetched: 5,
                filtered: 2,
                processed: 2,
            },
        }
    }

    #[tokio::test]
    async fn test_record_derives_totals_and_round_trips_categories() {
        let ledger = UsageLedger::in_memory().await.unwrap();
        ledger.record(&entry("alice", date(2024, 1, 2), 0.5)).await.unwrap();

        let record = ledger
            .query_by_date("alice", date(2024, 1, 2))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.arxiv_categories, vec!["q-fin.PR", "cs.AI"]);
        assert_eq!(record.filter_total_tokens, 105);
        assert_eq!(record.generate_total_tokens, 2400);
        assert_eq!(record.total_tokens, record.filter_total_tokens + record.generate_total_tokens);
        assert_eq!(record.total_input_tokens, 2100);
        assert_eq!(record.total_output_tokens, 405);
        assert!((record.total_cost - 0.51).abs() < 1e-9);
        assert!(!record.created_at.is_empty());
    }

    #[tokio::test]
    async fn test_second_write_replaces_first() {
        let ledger = UsageLedger::in_memory().await.unwrap();
        let day = date(2024, 1, 2);

        ledger.record(&entry("alice", day, 0.5)).await.unwrap();
        let mut rerun = entry("alice", day, 0.2);
        rerun.papers.processed = 1;
        ledger.record(&rerun).await.unwrap();

        let records = ledger.query_range("alice", day, day).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].papers_processed, 1);
        assert!((records[0].generate_cost - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let ledger = UsageLedger::in_memory().await.unwrap();
        assert!(ledger
            .query_by_date("nobody", date(2024, 1, 1))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_aggregate_with_no_rows_is_zero() {
        let ledger = UsageLedger::in_memory().await.unwrap();

        let totals = ledger.aggregate_by_user("nobody", None).await.unwrap();

        assert_eq!(totals, UsageTotals::default());
        assert!(ledger.aggregate_all_users(None).await.unwrap().is_empty());
    }
}
