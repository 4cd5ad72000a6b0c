use tabled::Tabled;
use super::recorder::AuditEntry;

#[derive(Debug, Clone, Tabled)]
pub struct HistoryRow {
    #[tabled(rename = "Notebook")]
    pub notebook: String,
    #[tabled(rename = "Started")]
    pub started: String,
    #[tabled(rename = "Duration")]
    pub duration: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Rows")]
    pub rows: String,
    #[tabled(rename = "Row Match")]
    pub row_match: String,
    #[tabled(rename = "Quality Match")]
    pub quality_match: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&AuditEntry<'_>> for HistoryRow {
    fn from(entry: &AuditEntry<'_>) -> Self {
        let started = entry.get_or_empty("start_time");
        // Drop sub-second precision for display.
        let started = started.split('.').next().unwrap_or(started).to_string();

        let duration = match entry.get_or_empty("duration_sec").parse::<f64>() {
            Ok(secs) => format!("{:.1}s", secs),
            Err(_) => "-".to_string(),
        };

        let rows = match (entry.get_or_empty("source_row_count"), entry.get_or_empty("target_row_count")) {
            ("", "") => "-".to_string(),
            (src, tgt) => format!("{} / {}", dash(src), dash(tgt)),
        };

        HistoryRow {
            notebook: entry.get_or_empty("notebook").to_string(),
            started,
            duration,
            status: entry.get_or_empty("status").to_string(),
            rows,
            row_match: dash(entry.get_or_empty("row_count_match")).to_string(),
            quality_match: dash(entry.get_or_empty("data_quality_match")).to_string(),
            error: truncate_error(entry.get_or_empty("error"), 60),
        }
    }
}

fn dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn truncate_error(error: &str, max_len: usize) -> String {
    let first_line = error.lines().next().unwrap_or("");
    if first_line.is_empty() {
        return "-".to_string();
    }

    if first_line.chars().count() <= max_len {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
