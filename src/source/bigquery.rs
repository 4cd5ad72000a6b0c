use async_trait::async_trait;
use gcp_bigquery_client::Client;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::QueryResponse;
use serde_json::Value;
use tracing::debug;
use crate::error::{parse_bq_error, ErrorContext, ExtractionError, MigReconError, Result};
use super::{DataHandle, DataLocator, DataSource, Row};

/// Warehouse tables addressed as `database.table`, where the database is a
/// BigQuery dataset in `project`.
#[derive(Clone)]
pub struct BigQuerySource {
    client: Client,
    project_id: String,
}

impl BigQuerySource {
    pub async fn new(project_id: impl Into<String>) -> Result<Self> {
        let client = Client::from_application_default_credentials()
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new().with_operation("client_init");
                MigReconError::Extraction(parse_bq_error(e, ctx))
            })?;

        Ok(Self {
            client,
            project_id: project_id.into(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

#[async_trait]
impl DataSource for BigQuerySource {
    fn backend(&self) -> &'static str {
        "bigquery"
    }

    async fn open(&self, locator: &DataLocator) -> std::result::Result<Box<dyn DataHandle>, ExtractionError> {
        let (dataset, table) = match locator {
            DataLocator::Table { database, table } => (database.clone(), table.clone()),
            DataLocator::Path { path } => {
                return Err(ExtractionError::UnsupportedLocator {
                    backend: "bigquery",
                    locator: path.clone(),
                });
            }
        };

        self.client
            .table()
            .get(&self.project_id, &dataset, &table, None)
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new()
                    .with_operation("open")
                    .with_table(&self.project_id, &dataset, &table);
                parse_bq_error(e, ctx)
            })?;

        Ok(Box::new(BigQueryHandle {
            client: self.client.clone(),
            project_id: self.project_id.clone(),
            dataset,
            table,
        }))
    }
}

struct BigQueryHandle {
    client: Client,
    project_id: String,
    dataset: String,
    table: String,
}

impl BigQueryHandle {
    fn table_ref(&self) -> String {
        format!("`{}.{}.{}`", self.project_id, self.dataset, self.table)
    }

    fn context(&self, operation: &str) -> ErrorContext {
        ErrorContext::new()
            .with_operation(operation)
            .with_table(&self.project_id, &self.dataset, &self.table)
    }

    async fn query(&self, sql: &str, operation: &str) -> std::result::Result<QueryResponse, ExtractionError> {
        debug!("{}: {}", operation, sql);
        let response = self.client
            .job()
            .query(&self.project_id, QueryRequest::new(sql))
            .await
            .map_err(|e| parse_bq_error(e, self.context(operation)))?;

        ensure_complete(&response, operation, &self.locator())?;
        Ok(response)
    }

    fn locator(&self) -> String {
        format!("{}.{}", self.dataset, self.table)
    }
}

/// `jobs.query` returns early with `jobComplete: false` and no rows when the
/// job outlives the synchronous wait. Those rows are not an empty table.
fn ensure_complete(response: &QueryResponse, operation: &str, locator: &str) -> std::result::Result<(), ExtractionError> {
    if response.job_complete == Some(false) {
        return Err(ExtractionError::Timeout {
            operation: format!("{} of {}", operation, locator),
            duration_ms: None,
        });
    }
    Ok(())
}

#[async_trait]
impl DataHandle for BigQueryHandle {
    async fn count_rows(&self) -> std::result::Result<u64, ExtractionError> {
        let sql = format!("SELECT COUNT(*) AS cnt FROM {}", self.table_ref());
        let result = self.query(&sql, "count_rows").await?;

        let cell = result.rows.as_ref()
            .and_then(|rows| rows.first())
            .and_then(|row| row.columns.as_ref())
            .and_then(|cells| cells.first())
            .and_then(|cell| cell.value.as_ref());

        match cell {
            Some(Value::String(s)) => s.parse::<u64>().map_err(|_| ExtractionError::Malformed {
                locator: self.locator(),
                message: format!("Could not parse count value: {}", s),
            }),
            Some(Value::Number(n)) => n.as_u64().ok_or_else(|| ExtractionError::Malformed {
                locator: self.locator(),
                message: format!("Count is not a non-negative integer: {}", n),
            }),
            _ => Err(ExtractionError::Malformed {
                locator: self.locator(),
                message: "COUNT(*) returned no rows".to_string(),
            }),
        }
    }

    async fn sample_rows(&self, limit: usize) -> std::result::Result<Vec<Row>, ExtractionError> {
        let sql = format!("SELECT * FROM {} LIMIT {}", self.table_ref(), limit);
        let result = self.query(&sql, "sample_rows").await?;

        let names: Vec<String> = result.schema.as_ref()
            .and_then(|s| s.fields.as_ref())
            .map(|fields| fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default();

        let mut rows = Vec::new();
        for table_row in result.rows.unwrap_or_default() {
            let cells = table_row.columns.unwrap_or_default();
            if cells.len() != names.len() {
                return Err(ExtractionError::SchemaMismatch {
                    locator: self.locator(),
                    message: format!("row has {} cells, schema has {} fields", cells.len(), names.len()),
                });
            }

            let row: Row = names.iter()
                .cloned()
                .zip(cells.into_iter().map(|c| c.value.unwrap_or(Value::Null)))
                .collect();
            rows.push(row);
        }

        Ok(rows)
    }
}
