//! Report assembly and on-disk artifacts.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::common::utils::safe_file_stem;
use crate::domains::papers::Paper;

/// File name of the saved report inside a user's work directory.
pub const REPORT_FILE_NAME: &str = "report.md";

const UNKNOWN_CATEGORY: &str = "unknown";

fn separator() -> String {
    "─".repeat(80)
}

/// Email subject for a user's report.
pub fn report_subject(user_name: &str) -> String {
    format!("Daily arXiv Paper Report - {}", user_name)
}

/// One summarized paper.
pub fn paper_section(paper: &Paper, summary: &str) -> String {
    let categories = if paper.categories.is_empty() {
        UNKNOWN_CATEGORY.to_string()
    } else {
        paper.categories.join(", ")
    };

    format!(
        "\n## {title}\n\n\
         * **Authors**: {authors}\n\
         * **Published**: {published}\n\
         * **Link**: [{url}]({url})\n\
         * **Primary category**: {primary}\n\
         * **Categories**: {categories}\n\
         * **Abstract**:\n\n\
         {abstract_text}\n\n\
         ### Summary\n\n\
         {summary}\n\n\
         {separator}\n",
        title = paper.title,
        authors = paper.authors.join(", "),
        published = paper.published_at.format("%Y-%m-%d"),
        url = paper.canonical_url,
        primary = paper.primary_category.as_deref().unwrap_or(UNKNOWN_CATEGORY),
        categories = categories,
        abstract_text = paper.abstract_text,
        summary = summary.trim(),
        separator = separator(),
    )
}

/// Stand-in for a paper whose processing failed.
pub fn failure_notice(paper: &Paper, error: &dyn Display) -> String {
    format!(
        "\n> **Failed to process paper**: [{title}]({url}). Error: {error}\n\n{separator}\n",
        title = paper.title,
        url = paper.canonical_url,
        error = error,
        separator = separator(),
    )
}

/// Appendix listing papers the interest filter removed. Empty when none were.
pub fn build_appendix(filtered_out: &[Paper]) -> String {
    if filtered_out.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    out.push_str(&"=".repeat(80));
    out.push_str("\n\n## Appendix: other papers (did not pass the interest filter)\n\n");
    out.push_str("These papers were excluded by the interest filter and are listed for review.\n");

    for (i, paper) in filtered_out.iter().enumerate() {
        out.push_str(&format!("\n### {}. {}\n\n", i + 1, paper.title));
        out.push_str(&format!("**Authors**: {}\n\n", paper.authors.join(", ")));
        out.push_str(&format!(
            "**Published**: {}\n\n",
            paper.published_at.format("%Y-%m-%d")
        ));
        out.push_str(&format!(
            "**Link**: [{url}]({url})\n\n",
            url = paper.canonical_url
        ));
        out.push_str(&format!(
            "**Primary category**: {}\n\n",
            paper.primary_category.as_deref().unwrap_or(UNKNOWN_CATEGORY)
        ));
        out.push_str(&format!("**Abstract**:\n{}\n\n", paper.abstract_text));
        out.push_str(&separator());
        out.push('\n');
    }

    out
}

/// Paper sections in order, then the appendix.
pub fn assemble_report(sections: &[String], filtered_out: &[Paper]) -> String {
    let mut report = sections.join("\n");
    let appendix = build_appendix(filtered_out);
    if !appendix.is_empty() {
        if !report.is_empty() {
            report.push_str("\n\n");
        }
        report.push_str(&appendix);
    }
    report
}

/// `work_dir/<safe user name>`, created if missing.
pub async fn user_work_dir(work_dir: &Path, user_name: &str) -> Result<PathBuf> {
    let dir = work_dir.join(safe_file_stem(user_name));
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create work directory {}", dir.display()))?;
    Ok(dir)
}

/// Save the report as `report.md` in `user_dir`, replacing any previous one.
pub async fn write_report(user_dir: &Path, report: &str) -> Result<PathBuf> {
    let path = user_dir.join(REPORT_FILE_NAME);
    tokio::fs::write(&path, report)
        .await
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn paper(n: usize) -> Paper {
        Paper {
            title: format!("Paper {}", n),
            canonical_url: format!("http://arxiv.org/abs/2401.0000{}v1", n),
            pdf_url: format!("http://arxiv.org/pdf/2401.0000{}v1", n),
            abstract_text: format!("Abstract {}.", n),
            authors: vec!["Ada".into(), "Alan".into()],
            published_at: Utc.with_ymd_and_hms(2024, 1, 9, 12, 0, 0).unwrap(),
            categories: vec!["q-fin.PR".into(), "cs.LG".into()],
            primary_category: Some("q-fin.PR".into()),
        }
    }

    #[test]
    fn test_paper_section_contains_metadata_and_summary() {
        let section = paper_section(&paper(1), "  The summary.\n");

        assert!(section.contains("## Paper 1"));
        assert!(section.contains("**Authors**: Ada, Alan"));
        assert!(section.contains("**Published**: 2024-01-09"));
        assert!(section.contains(
            "[http://arxiv.org/abs/2401.00001v1](http://arxiv.org/abs/2401.00001v1)"
        ));
        assert!(section.contains("**Primary category**: q-fin.PR"));
        assert!(section.contains("**Categories**: q-fin.PR, cs.LG"));
        assert!(section.contains("Abstract 1."));
        assert!(section.contains("### Summary\n\nThe summary.\n"));
    }

    #[test]
    fn test_failure_notice_names_paper() {
        let notice = failure_notice(&paper(2), &"provider timeout");
        assert!(notice.contains("Paper 2"));
        assert!(notice.contains("provider timeout"));
    }

    #[test]
    fn test_appendix_numbers_papers() {
        let appendix = build_appendix(&[paper(1), paper(2), paper(3)]);

        assert!(appendix.contains("## Appendix"));
        assert!(appendix.contains("### 1. Paper 1"));
        assert!(appendix.contains("### 3. Paper 3"));
        assert_eq!(appendix.matches("**Abstract**").count(), 3);
        assert!(build_appendix(&[]).is_empty());
    }

    #[test]
    fn test_assemble_report_orders_sections_before_appendix() {
        let sections = vec![paper_section(&paper(1), "S1"), paper_section(&paper(2), "S2")];
        let report = assemble_report(&sections, &[paper(3)]);

        let first = report.find("## Paper 1").unwrap();
        let second = report.find("## Paper 2").unwrap();
        let appendix = report.find("## Appendix").unwrap();
        assert!(first < second && second < appendix);
    }

    #[test]
    fn test_appendix_only_report() {
        let report = assemble_report(&[], &[paper(1)]);
        assert!(report.starts_with("===="));
    }

    #[tokio::test]
    async fn test_report_written_under_safe_user_dir() {
        let root = tempfile::tempdir().unwrap();

        let dir = user_work_dir(root.path(), "../Finance Team").await.unwrap();
        let path = write_report(&dir, "# Report").await.unwrap();

        assert_eq!(dir, root.path().join("Finance_Team"));
        assert_eq!(path, dir.join("report.md"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Report");
    }
}
