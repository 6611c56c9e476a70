use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::domains::usage::Pricing;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://token_usage.db?mode=rwc";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub ai_model: String,
    pub filter_temperature: f32,
    pub summary_temperature: f32,
    pub input_price_per_million: f64,
    pub output_price_per_million: f64,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_sender: String,
    pub smtp_password: String,
    pub users_config_path: PathBuf,
    pub days_lookback: u32,
    pub max_papers_per_user: Option<usize>,
    pub arxiv_max_results: usize,
    pub work_dir: PathBuf,
    pub html_to_pdf_command: String,
    pub daily_schedule: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: database_url_from_env(),
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_base_url: env::var("OPENAI_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            filter_temperature: parse_var("AI_FILTER_TEMPERATURE", 0.3)?,
            summary_temperature: parse_var("AI_SUMMARY_TEMPERATURE", 1.5)?,
            input_price_per_million: parse_var("AI_INPUT_PRICE_PER_MILLION", 0.0)?,
            output_price_per_million: parse_var("AI_OUTPUT_PRICE_PER_MILLION", 0.0)?,
            smtp_server: env::var("SMTP_SERVER").context("SMTP_SERVER must be set")?,
            smtp_port: parse_var("SMTP_PORT", 587)?,
            smtp_sender: env::var("SMTP_SENDER").context("SMTP_SENDER must be set")?,
            smtp_password: env::var("SMTP_PASSWORD").context("SMTP_PASSWORD must be set")?,
            users_config_path: env::var("USERS_CONFIG_PATH")
                .unwrap_or_else(|_| "users.toml".to_string())
                .into(),
            days_lookback: parse_var("DAYS_LOOKBACK", 1)?,
            max_papers_per_user: match parse_var::<usize>("MAX_PAPERS_PER_USER", 0)? {
                0 => None,
                n => Some(n),
            },
            arxiv_max_results: parse_var("ARXIV_MAX_RESULTS", 100)?,
            work_dir: env::var("WORK_DIR")
                .unwrap_or_else(|_| "temp".to_string())
                .into(),
            html_to_pdf_command: env::var("HTML_TO_PDF_COMMAND")
                .unwrap_or_else(|_| "wkhtmltopdf".to_string()),
            daily_schedule: env::var("DAILY_SCHEDULE")
                .unwrap_or_else(|_| "0 0 16 * * *".to_string()),
        })
    }

    /// Pipeline tunables carried by the dependency container.
    pub fn digest_settings(&self) -> DigestSettings {
        let pricing = Pricing::new(self.input_price_per_million, self.output_price_per_million);
        DigestSettings {
            model: self.ai_model.clone(),
            filter_temperature: self.filter_temperature,
            summary_temperature: self.summary_temperature,
            filter_pricing: pricing,
            generate_pricing: pricing,
            days_lookback: self.days_lookback,
            max_papers_per_user: self.max_papers_per_user,
            max_results: self.arxiv_max_results,
            work_dir: self.work_dir.clone(),
        }
    }
}

/// Ledger location from `DATABASE_URL`, with the local-file default.
///
/// Read on its own so ledger tooling runs without AI or SMTP credentials.
pub fn database_url_from_env() -> String {
    env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a valid value: {}", name, e)),
        _ => Ok(default),
    }
}

/// Settings consumed by the digest pipeline.
#[derive(Debug, Clone)]
pub struct DigestSettings {
    pub model: String,
    pub filter_temperature: f32,
    pub summary_temperature: f32,
    pub filter_pricing: Pricing,
    pub generate_pricing: Pricing,
    pub days_lookback: u32,
    pub max_papers_per_user: Option<usize>,
    pub max_results: usize,
    pub work_dir: PathBuf,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            filter_temperature: 0.3,
            summary_temperature: 1.5,
            filter_pricing: Pricing::default(),
            generate_pricing: Pricing::default(),
            days_lookback: 1,
            max_papers_per_user: None,
            max_results: 100,
            work_dir: PathBuf::from("temp"),
        }
    }
}

/// One configured report recipient.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub name: String,
    /// One address or a comma-separated list.
    pub email: String,
    pub arxiv_categories: Vec<String>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub interest_filter_prompt: Option<String>,
}

impl UserConfig {
    /// Interest filter prompt, ignoring blank values.
    pub fn interest_filter(&self) -> Option<&str> {
        self.interest_filter_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }

    /// Summary prompt override, ignoring blank values.
    pub fn summary_prompt(&self) -> Option<&str> {
        self.custom_prompt.as_deref().filter(|p| !p.trim().is_empty())
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("user entry has an empty name");
        }
        if self.email.trim().is_empty() {
            bail!("user {} has an empty email", self.name);
        }
        if self.arxiv_categories.iter().all(|c| c.trim().is_empty()) {
            bail!("user {} has no arxiv_categories", self.name);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UsersFile {
    #[serde(default)]
    users: Vec<UserConfig>,
}

/// Parse a users file body (`[[users]]` tables).
pub fn parse_users(raw: &str) -> Result<Vec<UserConfig>> {
    let file: UsersFile = toml::from_str(raw).context("Invalid users configuration")?;
    for user in &file.users {
        user.validate()?;
    }
    Ok(file.users)
}

/// Load the users file from disk.
pub fn load_users(path: &Path) -> Result<Vec<UserConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read users file {}", path.display()))?;
    parse_users(&raw)
}
