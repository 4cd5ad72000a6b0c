use gcp_bigquery_client::error::{BQError, ResponseError};
use super::extraction::ExtractionError;

pub fn parse_bq_error(error: BQError, context: ErrorContext) -> ExtractionError {
    let locator = context.locator();

    match &error {
        BQError::ResponseError { error: resp } => parse_response_error(resp, &context),

        BQError::RequestError(req_err) => {
            if req_err.is_timeout() {
                ExtractionError::Timeout {
                    operation: context.operation.unwrap_or_else(|| "query".to_string()),
                    duration_ms: None,
                }
            } else {
                ExtractionError::Unreachable {
                    locator,
                    reason: req_err.to_string(),
                }
            }
        }

        BQError::NoToken => {
            ExtractionError::AuthenticationFailed {
                reason: "No authentication token available".to_string(),
            }
        }

        BQError::AuthError(auth_err) => {
            ExtractionError::AuthenticationFailed {
                reason: format!("{:?}", auth_err),
            }
        }

        BQError::YupAuthError(yup_err) => {
            ExtractionError::AuthenticationFailed {
                reason: yup_err.to_string(),
            }
        }

        BQError::InvalidServiceAccountKey(io_err) => {
            ExtractionError::AuthenticationFailed {
                reason: format!("invalid service account key: {}", io_err),
            }
        }

        BQError::InvalidApplicationDefaultCredentialsAuthenticator(io_err) => {
            ExtractionError::AuthenticationFailed {
                reason: io_err.to_string(),
            }
        }

        BQError::NoDataAvailable => {
            ExtractionError::Malformed {
                locator,
                message: "No data available in response".to_string(),
            }
        }

        BQError::SerializationError(serde_err) => {
            ExtractionError::Malformed {
                locator,
                message: serde_err.to_string(),
            }
        }

        BQError::ConnectionPoolError(msg) => {
            ExtractionError::Unreachable {
                locator,
                reason: msg.clone(),
            }
        }

        _ => ExtractionError::Unknown {
            code: None,
            message: error.to_string(),
        },
    }
}

fn parse_response_error(resp: &ResponseError, context: &ErrorContext) -> ExtractionError {
    let status = resp.error.code;
    let message = &resp.error.message;
    let reason = resp.error.errors.first().and_then(|e| e.get("reason").map(|s| s.as_str()));

    match (status, reason) {
        (400, Some("timeout")) => ExtractionError::Timeout {
            operation: context.operation.clone().unwrap_or_else(|| "query".to_string()),
            duration_ms: None,
        },

        (400, Some("invalidQuery")) | (400, Some("invalid")) => {
            if message.to_lowercase().contains("unrecognized name") {
                ExtractionError::SchemaMismatch {
                    locator: context.locator(),
                    message: message.clone(),
                }
            } else {
                ExtractionError::Malformed {
                    locator: context.locator(),
                    message: message.clone(),
                }
            }
        }

        (401, _) => ExtractionError::AuthenticationFailed {
            reason: message.clone(),
        },

        (403, _) => ExtractionError::AccessDenied {
            locator: context.locator(),
            reason: message.clone(),
        },

        (404, _) => ExtractionError::NotFound {
            locator: context.locator(),
        },

        (500..=599, _) => ExtractionError::Unreachable {
            locator: context.locator(),
            reason: format!("BigQuery server error {}: {}", status, message),
        },

        _ => ExtractionError::Unknown {
            code: reason.map(|s| s.to_string()),
            message: message.clone(),
        },
    }
}

#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub operation: Option<String>,
    pub project: Option<String>,
    pub dataset: Option<String>,
    pub table: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }

    pub fn with_table(mut self, project: impl Into<String>, dataset: impl Into<String>, table: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self.dataset = Some(dataset.into());
        self.table = Some(table.into());
        self
    }

    pub fn locator(&self) -> String {
        match (&self.project, &self.dataset, &self.table) {
            (Some(p), Some(d), Some(t)) => format!("{}.{}.{}", p, d, t),
            (None, Some(d), Some(t)) => format!("{}.{}", d, t),
            _ => "<unknown>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_locator_full() {
        let ctx = ErrorContext::new()
            .with_operation("count_rows")
            .with_table("proj", "sales_db", "sales");
        assert_eq!(ctx.locator(), "proj.sales_db.sales");
        assert_eq!(ctx.operation.as_deref(), Some("count_rows"));
    }

    #[test]
    fn test_context_locator_unknown() {
        assert_eq!(ErrorContext::new().locator(), "<unknown>");
    }

    #[test]
    fn test_no_token_is_auth_failure() {
        let err = parse_bq_error(BQError::NoToken, ErrorContext::new());
        assert_eq!(err.error_code(), "AUTH_FAILED");
    }
}
