use serde::{Deserialize, Serialize};
use crate::fingerprint::Fingerprint;

/// Agreement between a source and a target fingerprint.
///
/// `content_match` compares digests of order-dependent samples. A `false`
/// means "investigate", and a `true` does not prove the full datasets equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationVerdict {
    pub row_count_match: bool,
    pub content_match: bool,
}

impl ReconciliationVerdict {
    pub fn is_match(&self) -> bool {
        self.row_count_match && self.content_match
    }
}

pub struct Reconciler;

impl Reconciler {
    pub fn compare(source: &Fingerprint, target: &Fingerprint) -> ReconciliationVerdict {
        ReconciliationVerdict {
            row_count_match: source.row_count == target.row_count,
            content_match: source.content_digest == target.content_digest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(rows: u64, digest: &str) -> Fingerprint {
        Fingerprint {
            row_count: rows,
            content_digest: digest.to_string(),
            sample_size: 10,
            sampled_rows: 10,
        }
    }

    #[test]
    fn test_identical_fingerprints_match() {
        let verdict = Reconciler::compare(&fp(1000, "abc"), &fp(1000, "abc"));
        assert!(verdict.row_count_match);
        assert!(verdict.content_match);
        assert!(verdict.is_match());
    }

    #[test]
    fn test_row_count_mismatch() {
        let verdict = Reconciler::compare(&fp(1000, "abc"), &fp(998, "abc"));
        assert!(!verdict.row_count_match);
        assert!(verdict.content_match);
        assert!(!verdict.is_match());
    }

    #[test]
    fn test_digest_mismatch() {
        let verdict = Reconciler::compare(&fp(10, "abc"), &fp(10, "abd"));
        assert!(verdict.row_count_match);
        assert!(!verdict.content_match);
    }

    #[test]
    fn test_compare_is_pure() {
        let a = fp(7, "x");
        let b = fp(8, "y");
        assert_eq!(Reconciler::compare(&a, &b), Reconciler::compare(&a, &b));
    }

    #[test]
    fn test_sample_size_is_not_compared() {
        let mut target = fp(10, "abc");
        target.sample_size = 50;
        assert!(Reconciler::compare(&fp(10, "abc"), &target).is_match());
    }
}
