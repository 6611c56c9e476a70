// Email delivery over SMTP with STARTTLS
//
// Reports are written in Markdown and sent as HTML with a plain-text
// alternative. The blocking lettre transport runs on the blocking pool.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use pulldown_cmark::{html, Options, Parser};

use super::BaseMailer;

/// Connection and command timeout for the SMTP session.
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    /// Used as both the From address and the login.
    pub sender: String,
    pub password: String,
}

pub struct SmtpMailer {
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn build_message(&self, subject: &str, markdown_body: &str, recipients: &[String]) -> Result<Message> {
        let from: Mailbox = self
            .settings
            .sender
            .parse()
            .with_context(|| format!("Invalid sender address {}", self.settings.sender))?;

        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in recipients {
            let to: Mailbox = recipient
                .parse()
                .with_context(|| format!("Invalid recipient address {}", recipient))?;
            builder = builder.to(to);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                markdown_body.to_string(),
                render_markdown(markdown_body),
            ))
            .context("Failed to build email")
    }

    fn send_blocking(settings: &SmtpSettings, message: &Message) -> Result<()> {
        let transport = SmtpTransport::starttls_relay(&settings.server)
            .with_context(|| format!("Invalid SMTP server {}", settings.server))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.sender.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        transport.send(message).context("SMTP send failed")?;
        Ok(())
    }

    async fn try_deliver(&self, subject: &str, markdown_body: &str, recipients: &str) -> Result<()> {
        let recipients = parse_recipients(recipients);
        if recipients.is_empty() {
            return Err(anyhow!("no recipients"));
        }

        let message = self.build_message(subject, markdown_body, &recipients)?;
        let settings = self.settings.clone();

        tracing::info!(
            server = %settings.server,
            recipients = recipients.len(),
            "Connecting to SMTP server"
        );

        tokio::task::spawn_blocking(move || Self::send_blocking(&settings, &message))
            .await
            .context("SMTP task aborted")?
    }
}

#[async_trait]
impl BaseMailer for SmtpMailer {
    async fn deliver(&self, subject: &str, markdown_body: &str, recipients: &str) -> bool {
        match self.try_deliver(subject, markdown_body, recipients).await {
            Ok(()) => {
                tracing::info!(recipients = %recipients, "Email sent");
                true
            }
            Err(e) => {
                tracing::error!(recipients = %recipients, error = %e, "Email delivery failed");
                false
            }
        }
    }
}

/// Markdown to HTML with tables and strikethrough enabled.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Split a comma-separated recipient list, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}
