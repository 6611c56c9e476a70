// HTML to PDF conversion through an external command (wkhtmltopdf by default)

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use super::BaseHtmlRenderer;

/// The converter is killed when it runs longer than this.
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CommandRenderer {
    program: String,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl BaseHtmlRenderer for CommandRenderer {
    async fn render_pdf(&self, html_path: &Path, pdf_path: &Path) -> Result<()> {
        let child = Command::new(&self.program)
            .arg("--quiet")
            .arg(html_path)
            .arg(pdf_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                )
            })?
            .with_context(|| format!("Failed to wait for {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }

        if !tokio::fs::try_exists(pdf_path).await.unwrap_or(false) {
            bail!("{} produced no output file", self.program);
        }

        Ok(())
    }
}
