mod message;

use crate::runner::{RunRecord, RunStatus};

pub use message::AlertMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    Failed,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::NonCompliant => "noncompliant",
            ComplianceStatus::Failed => "failed",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "✓",
            ComplianceStatus::NonCompliant => "⚠",
            ComplianceStatus::Failed => "✗",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub status: ComplianceStatus,
    pub should_alert: bool,
}

pub struct ComplianceEvaluator;

impl ComplianceEvaluator {
    /// Total over every record shape. A `SUCCESS` record without a verdict
    /// cannot be shown compliant, so it alerts as noncompliant.
    pub fn evaluate(record: &RunRecord) -> Evaluation {
        let status = match (record.status, record.verdict) {
            (RunStatus::Failed, _) => ComplianceStatus::Failed,
            (RunStatus::Success, Some(v)) if v.is_match() => ComplianceStatus::Compliant,
            (RunStatus::Success, _) => ComplianceStatus::NonCompliant,
        };

        Evaluation {
            status,
            should_alert: status != ComplianceStatus::Compliant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::reconcile::ReconciliationVerdict;

    fn record(status: RunStatus, verdict: Option<(bool, bool)>) -> RunRecord {
        let now = Utc::now();
        RunRecord {
            run_id: "r".into(),
            unit_name: "migrate_sales".into(),
            notebook: "notebooks/migrate_sales.ipynb".into(),
            params: "{}".into(),
            start_time: now,
            end_time: now,
            duration_sec: 0.0,
            status,
            error: String::new(),
            output_artifact: String::new(),
            verdict: verdict.map(|(r, c)| ReconciliationVerdict { row_count_match: r, content_match: c }),
            source_fingerprint: None,
            target_fingerprint: None,
        }
    }

    #[test]
    fn test_failed_always_alerts() {
        for verdict in [None, Some((true, true)), Some((false, true)), Some((true, false))] {
            let eval = ComplianceEvaluator::evaluate(&record(RunStatus::Failed, verdict));
            assert!(eval.should_alert);
            assert_eq!(eval.status, ComplianceStatus::Failed);
        }
    }

    #[test]
    fn test_success_alerts_iff_any_flag_false() {
        for (row, content) in [(true, true), (true, false), (false, true), (false, false)] {
            let eval = ComplianceEvaluator::evaluate(&record(RunStatus::Success, Some((row, content))));
            assert_eq!(eval.should_alert, !row || !content);
        }
    }

    #[test]
    fn test_fully_matching_success_is_compliant() {
        let eval = ComplianceEvaluator::evaluate(&record(RunStatus::Success, Some((true, true))));
        assert_eq!(eval, Evaluation { status: ComplianceStatus::Compliant, should_alert: false });
    }

    #[test]
    fn test_success_without_verdict_alerts() {
        let eval = ComplianceEvaluator::evaluate(&record(RunStatus::Success, None));
        assert_eq!(eval.status, ComplianceStatus::NonCompliant);
        assert!(eval.should_alert);
    }
}
