use crate::runner::RunRecord;

/// Canonical column order for newly created audit logs. Older logs keep
/// their own order; columns they lack are appended after it.
pub const AUDIT_COLUMNS: &[&str] = &[
    "notebook",
    "params",
    "start_time",
    "end_time",
    "duration_sec",
    "status",
    "error",
    "output_notebook",
    "row_count_match",
    "data_quality_match",
    "source_row_count",
    "target_row_count",
    "source_digest",
    "target_digest",
    "run_id",
];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn record_values(record: &RunRecord) -> Vec<(&'static str, String)> {
    let src = record.source_fingerprint.as_ref();
    let tgt = record.target_fingerprint.as_ref();

    vec![
        ("notebook", record.notebook.clone()),
        ("params", record.params.clone()),
        ("start_time", record.start_time.format(TIME_FORMAT).to_string()),
        ("end_time", record.end_time.format(TIME_FORMAT).to_string()),
        ("duration_sec", record.duration_sec.to_string()),
        ("status", record.status.as_str().to_string()),
        ("error", record.error.clone()),
        ("output_notebook", record.output_artifact.clone()),
        ("row_count_match", flag(record.row_count_match())),
        ("data_quality_match", flag(record.content_match())),
        ("source_row_count", src.map(|f| f.row_count.to_string()).unwrap_or_default()),
        ("target_row_count", tgt.map(|f| f.row_count.to_string()).unwrap_or_default()),
        ("source_digest", src.map(|f| f.content_digest.clone()).unwrap_or_default()),
        ("target_digest", tgt.map(|f| f.content_digest.clone()).unwrap_or_default()),
        ("run_id", record.run_id.clone()),
    ]
}

// Matches the True/False/empty spelling of logs written by earlier tooling.
fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "True".to_string(),
        Some(false) => "False".to_string(),
        None => String::new(),
    }
}

/// Existing header order first, then any canonical columns it lacks.
pub fn merge_headers(existing: &[String]) -> Vec<String> {
    let mut headers: Vec<String> = existing.to_vec();
    for col in AUDIT_COLUMNS {
        if !headers.iter().any(|h| h == col) {
            headers.push(col.to_string());
        }
    }
    headers
}
