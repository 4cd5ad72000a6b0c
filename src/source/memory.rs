use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use crate::error::ExtractionError;
use super::{DataHandle, DataLocator, DataSource, Row};

/// In-process tables, used by tests and dry runs.
///
/// Tracks how many handles were opened and how many are still alive so
/// callers can assert that every handle is released.
#[derive(Default)]
pub struct MemorySource {
    tables: RwLock<HashMap<DataLocator, Arc<Vec<Row>>>>,
    open_failures: RwLock<HashMap<DataLocator, ExtractionError>>,
    sample_failures: RwLock<HashMap<DataLocator, ExtractionError>>,
    latency: Option<Duration>,
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every handle operation sleeps for `latency` first.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, locator: DataLocator, rows: Vec<Row>) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(locator, Arc::new(rows));
        }
    }

    pub fn fail_open(&self, locator: DataLocator, error: ExtractionError) {
        if let Ok(mut failures) = self.open_failures.write() {
            failures.insert(locator, error);
        }
    }

    pub fn fail_sample(&self, locator: DataLocator, error: ExtractionError) {
        if let Ok(mut failures) = self.sample_failures.write() {
            failures.insert(locator, error);
        }
    }

    pub fn opened_handles(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MemorySource {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn open(&self, locator: &DataLocator) -> Result<Box<dyn DataHandle>, ExtractionError> {
        if let Some(err) = self.open_failures.read().ok().and_then(|f| f.get(locator).cloned()) {
            return Err(err);
        }

        let rows = self.tables.read().ok()
            .and_then(|t| t.get(locator).cloned())
            .ok_or_else(|| ExtractionError::NotFound { locator: locator.to_string() })?;

        let sample_failure = self.sample_failures.read().ok().and_then(|f| f.get(locator).cloned());

        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryHandle {
            rows,
            sample_failure,
            latency: self.latency,
            live: Arc::clone(&self.live),
        }))
    }
}

struct MemoryHandle {
    rows: Arc<Vec<Row>>,
    sample_failure: Option<ExtractionError>,
    latency: Option<Duration>,
    live: Arc<AtomicUsize>,
}

impl MemoryHandle {
    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataHandle for MemoryHandle {
    async fn count_rows(&self) -> Result<u64, ExtractionError> {
        self.wait().await;
        Ok(self.rows.len() as u64)
    }

    async fn sample_rows(&self, limit: usize) -> Result<Vec<Row>, ExtractionError> {
        self.wait().await;
        if let Some(err) = &self.sample_failure {
            return Err(err.clone());
        }
        Ok(self.rows.iter().take(limit).cloned().collect())
    }
}
