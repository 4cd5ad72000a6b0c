mod bigquery;
mod lake;
mod memory;
mod row;

use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::config::SourceConfig;
use crate::error::{ExtractionError, Result};

pub use bigquery::BigQuerySource;
pub use lake::LakeSource;
pub use memory::MemorySource;
pub use row::Row;

/// Where a dataset lives: a warehouse table or a lake storage path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataLocator {
    Table { database: String, table: String },
    Path { path: String },
}

impl DataLocator {
    pub fn table(database: impl Into<String>, table: impl Into<String>) -> Self {
        DataLocator::Table {
            database: database.into(),
            table: table.into(),
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        DataLocator::Path { path: path.into() }
    }
}

impl fmt::Display for DataLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLocator::Table { database, table } => write!(f, "{}.{}", database, table),
            DataLocator::Path { path } => write!(f, "{}", path),
        }
    }
}

/// An open, scoped view of one dataset. Dropping the handle releases
/// whatever the backend acquired in [`DataSource::open`].
#[async_trait]
pub trait DataHandle: Send + Sync {
    /// Exact cardinality of the whole dataset.
    async fn count_rows(&self) -> std::result::Result<u64, ExtractionError>;

    /// Up to `limit` rows in the store's natural order.
    async fn sample_rows(&self, limit: usize) -> std::result::Result<Vec<Row>, ExtractionError>;
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn open(&self, locator: &DataLocator) -> std::result::Result<Box<dyn DataHandle>, ExtractionError>;
}

pub async fn connect(config: &SourceConfig) -> Result<Arc<dyn DataSource>> {
    match config {
        SourceConfig::Bigquery { project } => {
            let source = BigQuerySource::new(project.clone()).await?;
            Ok(Arc::new(source))
        }
        SourceConfig::Lake { root } => Ok(Arc::new(LakeSource::new(root.clone()))),
    }
}
