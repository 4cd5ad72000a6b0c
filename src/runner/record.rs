use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::fingerprint::Fingerprint;
use crate::reconcile::ReconciliationVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit entry for one execution attempt of one migration unit.
///
/// `verdict` is `None` whenever the run failed before both fingerprints
/// were extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub unit_name: String,
    pub notebook: String,
    pub params: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_sec: f64,
    pub status: RunStatus,
    pub error: String,
    pub output_artifact: String,
    pub verdict: Option<ReconciliationVerdict>,
    pub source_fingerprint: Option<Fingerprint>,
    pub target_fingerprint: Option<Fingerprint>,
}

impl RunRecord {
    pub fn row_count_match(&self) -> Option<bool> {
        self.verdict.map(|v| v.row_count_match)
    }

    pub fn content_match(&self) -> Option<bool> {
        self.verdict.map(|v| v.content_match)
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(RunStatus::Success.as_str(), "SUCCESS");
        assert_eq!(RunStatus::Failed.to_string(), "FAILED");
        assert_eq!(serde_json::to_string(&RunStatus::Failed).unwrap(), "\"FAILED\"");
    }
}
