use std::time::Duration;
use tracing::debug;
use crate::error::ExtractionError;
use crate::source::{DataLocator, DataSource};
use super::{content_digest, Fingerprint, DEFAULT_SAMPLE_SIZE};

#[derive(Debug, Clone)]
pub struct FingerprintExtractor {
    sample_size: usize,
    timeout: Option<Duration>,
}

impl FingerprintExtractor {
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Opens `locator` on `source`, counts every row, and digests the first
    /// `sample_size` rows in the store's natural order.
    ///
    /// The handle lives only for this call; it is dropped on success, on
    /// error, and when the timeout cancels the in-flight future.
    pub async fn extract(
        &self,
        source: &dyn DataSource,
        locator: &DataLocator,
    ) -> Result<Fingerprint, ExtractionError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.extract_inner(source, locator))
                .await
                .map_err(|_| ExtractionError::Timeout {
                    operation: format!("fingerprint {} ({})", locator, source.backend()),
                    duration_ms: Some(limit.as_millis() as u64),
                })?,
            None => self.extract_inner(source, locator).await,
        }
    }

    async fn extract_inner(
        &self,
        source: &dyn DataSource,
        locator: &DataLocator,
    ) -> Result<Fingerprint, ExtractionError> {
        let handle = source.open(locator).await?;
        let row_count = handle.count_rows().await?;
        let sample = handle.sample_rows(self.sample_size).await?;

        let fingerprint = Fingerprint {
            row_count,
            content_digest: content_digest(&sample),
            sample_size: self.sample_size,
            sampled_rows: sample.len(),
        };

        debug!(
            "{} {}: {} rows, digest {} over {} sampled",
            source.backend(),
            locator,
            fingerprint.row_count,
            fingerprint.short_digest(),
            fingerprint.sampled_rows,
        );

        Ok(fingerprint)
    }
}

impl Default for FingerprintExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE)
    }
}
