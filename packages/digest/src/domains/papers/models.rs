use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};

/// A paper as returned by the preprint search provider.
///
/// Identity is `canonical_url`; titles are not unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Paper {
    pub title: String,
    pub canonical_url: String,
    pub pdf_url: String,
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub categories: Vec<String>,
    pub primary_category: Option<String>,
}

impl Paper {
    /// arXiv identifier (last path segment of the canonical URL).
    pub fn arxiv_id(&self) -> Option<&str> {
        arxiv_id_from_url(&self.canonical_url)
    }
}

/// arXiv identifier from an `/abs/`, `/pdf/` or `/html/` URL.
///
/// Old-style identifiers keep their archive prefix (`hep-th/9901001v1`).
pub fn arxiv_id_from_url(url: &str) -> Option<&str> {
    if !url.contains("arxiv.org") {
        return None;
    }

    let (_, rest) = ["/abs/", "/pdf/", "/html/"]
        .iter()
        .find_map(|marker| url.split_once(marker))?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let id = rest.trim_end_matches('/');
    let id = id.strip_suffix(".pdf").unwrap_or(id);

    Some(id).filter(|id| !id.is_empty())
}

/// Earliest publication date included in a run.
///
/// `today - days_lookback`, moved back to Friday when that lands on a weekend.
pub fn target_date(today: NaiveDate, days_lookback: u32) -> NaiveDate {
    let target = today
        .checked_sub_days(Days::new(u64::from(days_lookback)))
        .unwrap_or(today);

    match target.weekday() {
        Weekday::Sat => target.pred_opt().unwrap_or(target),
        Weekday::Sun => target
            .checked_sub_days(Days::new(2))
            .unwrap_or(target),
        _ => target,
    }
}

/// Keep papers published at or after midnight UTC of `since`, preserving order.
pub fn published_since(papers: Vec<Paper>, since: NaiveDate) -> Vec<Paper> {
    let cutoff = since.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    match cutoff {
        Some(cutoff) => papers
            .into_iter()
            .filter(|p| p.published_at >= cutoff)
            .collect(),
        None => papers,
    }
}
