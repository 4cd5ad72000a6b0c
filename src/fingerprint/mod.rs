mod digest;
mod extractor;

use serde::{Deserialize, Serialize};

pub use digest::{canonical_bytes, content_digest};
pub use extractor::FingerprintExtractor;

pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Row count and sampled-content digest of one dataset at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub row_count: u64,
    pub content_digest: String,
    pub sample_size: usize,
    pub sampled_rows: usize,
}

impl Fingerprint {
    pub fn short_digest(&self) -> &str {
        &self.content_digest[..self.content_digest.len().min(12)]
    }
}
