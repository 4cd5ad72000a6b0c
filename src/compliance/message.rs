use crate::runner::RunRecord;

/// Text sent over every alert channel for one failed or noncompliant unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub unit: String,
    pub body: String,
}

impl AlertMessage {
    pub fn from_record(record: &RunRecord) -> Self {
        let mut body = String::from("Migration Alert!\n");
        body.push_str(&format!("Notebook: {}\n", record.notebook));
        body.push_str(&format!("Params: {}\n", record.params));
        body.push_str(&format!("Status: {}\n", record.status));
        body.push_str(&format!("Row Count Match: {}\n", flag(record.row_count_match())));

        if let (Some(src), Some(tgt)) = (&record.source_fingerprint, &record.target_fingerprint) {
            if src.row_count != tgt.row_count {
                body.push_str(&format!(
                    "  Source rows: {}, Target rows: {} (difference {})\n",
                    src.row_count,
                    tgt.row_count,
                    src.row_count as i128 - tgt.row_count as i128,
                ));
            }
        }

        body.push_str(&format!("Data Quality Match: {}\n", flag(record.content_match())));

        if let (Some(src), Some(tgt)) = (&record.source_fingerprint, &record.target_fingerprint) {
            if src.content_digest != tgt.content_digest {
                body.push_str(&format!(
                    "  Sample digests differ over first {} rows: source {} / target {}\n",
                    src.sample_size,
                    src.short_digest(),
                    tgt.short_digest(),
                ));
            }
        }

        let error = if record.error.is_empty() { "N/A" } else { record.error.as_str() };
        body.push_str(&format!("Error: {}", error));

        Self {
            unit: record.unit_name.clone(),
            body,
        }
    }

    pub fn text(&self) -> &str {
        &self.body
    }
}

fn flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "True",
        Some(false) => "False",
        None => "None",
    }
}
