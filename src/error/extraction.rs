use std::fmt;

/// Failure to derive a fingerprint from a source or target dataset.
#[derive(Debug, Clone)]
pub enum ExtractionError {
    Unreachable {
        locator: String,
        reason: String,
    },

    AuthenticationFailed {
        reason: String,
    },

    NotFound {
        locator: String,
    },

    AccessDenied {
        locator: String,
        reason: String,
    },

    SchemaMismatch {
        locator: String,
        message: String,
    },

    Malformed {
        locator: String,
        message: String,
    },

    Timeout {
        operation: String,
        duration_ms: Option<u64>,
    },

    UnsupportedLocator {
        backend: &'static str,
        locator: String,
    },

    Unknown {
        code: Option<String>,
        message: String,
    },
}

impl ExtractionError {
    pub fn suggestion(&self) -> String {
        match self {
            ExtractionError::Unreachable { .. } => {
                "Check connectivity:\n  \
                 • Verify the host or storage mount is reachable from this machine\n  \
                 • Check firewall and VPN settings\n  \
                 • Try again in a few moments".to_string()
            }

            ExtractionError::AuthenticationFailed { .. } => {
                "Try:\n  \
                 • Run: gcloud auth application-default login\n  \
                 • Or set GOOGLE_APPLICATION_CREDENTIALS to your service account key file".to_string()
            }

            ExtractionError::NotFound { locator } => {
                format!(
                    "Verify the dataset exists:\n  \
                     • Check '{locator}' in the unit configuration for typos\n  \
                     • Ensure the migration actually wrote to this location"
                )
            }

            ExtractionError::AccessDenied { locator, .. } => {
                format!(
                    "Request read access to {locator}:\n  \
                     • Contact the dataset owner\n  \
                     • Check the service account used by this pipeline"
                )
            }

            ExtractionError::SchemaMismatch { .. } => {
                "Schema mismatch:\n  \
                 • Compare source and target column lists\n  \
                 • Re-run the migration transform if the target schema is stale".to_string()
            }

            ExtractionError::Malformed { .. } => {
                "Malformed data:\n  \
                 • Inspect the offending file or query response\n  \
                 • Ensure part files contain one JSON object per line".to_string()
            }

            ExtractionError::Timeout { operation, .. } => {
                format!(
                    "Operation '{operation}' timed out:\n  \
                     • Raise unit_timeout_secs for large tables\n  \
                     • Reduce sample_size"
                )
            }

            ExtractionError::UnsupportedLocator { backend, .. } => {
                format!(
                    "The {backend} backend cannot address this location:\n  \
                     • Use source: {{ database, table }} for warehouse tables\n  \
                     • Use target: {{ path }} for lake tables"
                )
            }

            ExtractionError::Unknown { .. } => {
                "An unexpected error occurred:\n  \
                 • Check the error message for details\n  \
                 • Verify the data source configuration".to_string()
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ExtractionError::Unreachable { .. } => "UNREACHABLE",
            ExtractionError::AuthenticationFailed { .. } => "AUTH_FAILED",
            ExtractionError::NotFound { .. } => "NOT_FOUND",
            ExtractionError::AccessDenied { .. } => "ACCESS_DENIED",
            ExtractionError::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            ExtractionError::Malformed { .. } => "MALFORMED",
            ExtractionError::Timeout { .. } => "TIMEOUT",
            ExtractionError::UnsupportedLocator { .. } => "UNSUPPORTED_LOCATOR",
            ExtractionError::Unknown { .. } => "UNKNOWN",
        }
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::Unreachable { locator, reason } => {
                write!(f, "Cannot reach {locator}: {reason}")
            }

            ExtractionError::AuthenticationFailed { reason } => {
                write!(f, "Authentication failed: {reason}")
            }

            ExtractionError::NotFound { locator } => {
                write!(f, "Dataset not found: {locator}")
            }

            ExtractionError::AccessDenied { locator, reason } => {
                write!(f, "Access denied to {locator}: {reason}")
            }

            ExtractionError::SchemaMismatch { locator, message } => {
                write!(f, "Schema mismatch in {locator}: {message}")
            }

            ExtractionError::Malformed { locator, message } => {
                write!(f, "Malformed data in {locator}: {message}")
            }

            ExtractionError::Timeout { operation, duration_ms } => {
                write!(f, "Timeout during {operation}")?;
                if let Some(ms) = duration_ms {
                    write!(f, " (after {}ms)", ms)?;
                }
                Ok(())
            }

            ExtractionError::UnsupportedLocator { backend, locator } => {
                write!(f, "{backend} backend cannot open {locator}")
            }

            ExtractionError::Unknown { code, message } => {
                if let Some(c) = code {
                    write!(f, "Extraction error [{c}]: {message}")
                } else {
                    write!(f, "Extraction error: {message}")
                }
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ExtractionError::NotFound { locator: "x".into() }.error_code(), "NOT_FOUND");
        assert_eq!(ExtractionError::Timeout {
            operation: "count".into(),
            duration_ms: None,
        }.error_code(), "TIMEOUT");
        assert_eq!(ExtractionError::Malformed {
            locator: "x".into(),
            message: "m".into(),
        }.error_code(), "MALFORMED");
        assert_eq!(ExtractionError::UnsupportedLocator {
            backend: "lake",
            locator: "db.t".into(),
        }.error_code(), "UNSUPPORTED_LOCATOR");
    }

    #[test]
    fn test_display_timeout_with_duration() {
        let err = ExtractionError::Timeout {
            operation: "count_rows".into(),
            duration_ms: Some(30000),
        };
        assert_eq!(err.to_string(), "Timeout during count_rows (after 30000ms)");
    }

    #[test]
    fn test_display_unknown_with_code() {
        let err = ExtractionError::Unknown {
            code: Some("INTERNAL".into()),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Extraction error [INTERNAL]: boom");
    }

    #[test]
    fn test_suggestion_not_found_names_locator() {
        let err = ExtractionError::NotFound { locator: "sales_db.sales".into() };
        assert!(err.suggestion().contains("sales_db.sales"));
    }

    #[test]
    fn test_suggestion_timeout() {
        let err = ExtractionError::Timeout {
            operation: "sample_rows".into(),
            duration_ms: None,
        };
        assert!(err.suggestion().contains("unit_timeout_secs"));
    }
}
