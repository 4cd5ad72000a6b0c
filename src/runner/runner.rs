use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use crate::config::MigrationUnit;
use crate::error::{error_chain, ExecutorError, ExtractionError};
use crate::fingerprint::{Fingerprint, FingerprintExtractor, DEFAULT_SAMPLE_SIZE};
use crate::reconcile::{Reconciler, ReconciliationVerdict};
use crate::source::DataSource;
use super::executor::{artifact_path, TransformExecutor};
use super::record::{RunRecord, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Verifying,
    Compliant,
    NonCompliant,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }
}

/// What happened to one unit, before it is flattened into a [`RunRecord`].
enum Outcome {
    ExecutorFailed(ExecutorError),
    ExtractionFailed {
        artifact: String,
        side: Side,
        error: ExtractionError,
        source: Option<Fingerprint>,
    },
    Verified {
        artifact: String,
        source: Fingerprint,
        target: Fingerprint,
        verdict: ReconciliationVerdict,
    },
}

pub struct MigrationRunner {
    executor: Arc<dyn TransformExecutor>,
    source: Arc<dyn DataSource>,
    target: Arc<dyn DataSource>,
    artifact_dir: PathBuf,
    sample_size: usize,
    timeout: Option<Duration>,
    run_id: String,
}

impl MigrationRunner {
    pub fn new(
        executor: Arc<dyn TransformExecutor>,
        source: Arc<dyn DataSource>,
        target: Arc<dyn DataSource>,
    ) -> Self {
        Self {
            executor,
            source,
            target,
            artifact_dir: PathBuf::from("executed_notebooks"),
            sample_size: DEFAULT_SAMPLE_SIZE,
            timeout: None,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Executes the unit's transform, then fingerprints source and target.
    ///
    /// Never fails: executor and extraction errors become a `FAILED` record.
    /// No retries are attempted.
    pub async fn run(&self, unit: &MigrationUnit) -> RunRecord {
        let name = unit.name();
        let start_time = Utc::now();
        let deadline = self.timeout_for(unit).map(|t| (Instant::now() + t, t));
        let artifact = artifact_path(&self.artifact_dir, &unit.path, start_time);

        transition(&name, RunState::Pending, RunState::Running);
        info!("Running {} with compliance checks", unit.path);

        let outcome = self.drive(unit, &name, &artifact, deadline).await;

        let end_time = Utc::now();
        let duration_sec = (end_time - start_time).num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or_else(|| (end_time - start_time).num_milliseconds() as f64 / 1000.0);

        let mut record = RunRecord {
            run_id: self.run_id.clone(),
            unit_name: name.clone(),
            notebook: unit.path.clone(),
            params: unit.params_display(),
            start_time,
            end_time,
            duration_sec,
            status: RunStatus::Success,
            error: String::new(),
            output_artifact: artifact.display().to_string(),
            verdict: None,
            source_fingerprint: None,
            target_fingerprint: None,
        };

        match outcome {
            Outcome::ExecutorFailed(err) => {
                warn!("{}: transform failed: {}", name, err);
                record.status = RunStatus::Failed;
                record.error = error_chain(&err);
            }
            Outcome::ExtractionFailed { artifact, side, error, source } => {
                transition(&name, RunState::Verifying, RunState::Failed);
                record.output_artifact = artifact;
                warn!("{}: {} extraction failed: {}", name, side.as_str(), error);
                record.status = RunStatus::Failed;
                record.error = format!(
                    "{} extraction failed [{}]: {}",
                    side.as_str(),
                    error.error_code(),
                    error_chain(&error),
                );
                record.source_fingerprint = source;
            }
            Outcome::Verified { artifact, source, target, verdict } => {
                let state = if verdict.is_match() { RunState::Compliant } else { RunState::NonCompliant };
                transition(&name, RunState::Verifying, state);
                record.output_artifact = artifact;
                record.verdict = Some(verdict);
                record.source_fingerprint = Some(source);
                record.target_fingerprint = Some(target);
            }
        }

        record
    }

    async fn drive(
        &self,
        unit: &MigrationUnit,
        name: &str,
        artifact: &std::path::Path,
        deadline: Option<(Instant, Duration)>,
    ) -> Outcome {
        let executed = match deadline {
            Some((at, limit)) => tokio::time::timeout_at(at, self.executor.execute(unit, artifact))
                .await
                .unwrap_or_else(|_| Err(ExecutorError::Timeout {
                    unit: name.to_string(),
                    duration_secs: limit.as_secs(),
                })),
            None => self.executor.execute(unit, artifact).await,
        };

        let artifact = match executed {
            Ok(location) => location,
            Err(err) => {
                transition(name, RunState::Running, RunState::Failed);
                return Outcome::ExecutorFailed(err);
            }
        };
        debug!("{}: transform wrote {}", name, artifact);

        transition(name, RunState::Running, RunState::Verifying);

        let source = match self.extract(unit, Side::Source, deadline).await {
            Ok(fp) => fp,
            Err(error) => {
                return Outcome::ExtractionFailed { artifact, side: Side::Source, error, source: None };
            }
        };

        let target = match self.extract(unit, Side::Target, deadline).await {
            Ok(fp) => fp,
            Err(error) => {
                return Outcome::ExtractionFailed { artifact, side: Side::Target, error, source: Some(source) };
            }
        };

        let verdict = Reconciler::compare(&source, &target);
        info!(
            "{}: source {} rows / target {} rows, row_count_match={} content_match={}",
            name, source.row_count, target.row_count, verdict.row_count_match, verdict.content_match,
        );

        Outcome::Verified { artifact, source, target, verdict }
    }

    async fn extract(
        &self,
        unit: &MigrationUnit,
        side: Side,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<Fingerprint, ExtractionError> {
        let extractor = FingerprintExtractor::new(unit.sample_size.unwrap_or(self.sample_size));
        let (backend, locator) = match side {
            Side::Source => (&self.source, unit.source_locator()),
            Side::Target => (&self.target, unit.target_locator()),
        };

        match deadline {
            Some((at, limit)) => tokio::time::timeout_at(at, extractor.extract(backend.as_ref(), &locator))
                .await
                .map_err(|_| ExtractionError::Timeout {
                    operation: format!("{} fingerprint of {}", side.as_str(), locator),
                    duration_ms: Some(limit.as_millis() as u64),
                })?,
            None => extractor.extract(backend.as_ref(), &locator).await,
        }
    }

    /// A `FAILED` record for a unit whose run never produced one, such as a
    /// unit task that panicked.
    pub fn failed_record(&self, unit: &MigrationUnit, message: impl Into<String>) -> RunRecord {
        let now = Utc::now();
        RunRecord {
            run_id: self.run_id.clone(),
            unit_name: unit.name(),
            notebook: unit.path.clone(),
            params: unit.params_display(),
            start_time: now,
            end_time: now,
            duration_sec: 0.0,
            status: RunStatus::Failed,
            error: message.into(),
            output_artifact: String::new(),
            verdict: None,
            source_fingerprint: None,
            target_fingerprint: None,
        }
    }

    /// Fingerprints one side of a unit without running its transform.
    pub async fn fingerprint(&self, unit: &MigrationUnit, side: Side) -> Result<Fingerprint, ExtractionError> {
        let deadline = self.timeout_for(unit).map(|t| (Instant::now() + t, t));
        self.extract(unit, side, deadline).await
    }

    fn timeout_for(&self, unit: &MigrationUnit) -> Option<Duration> {
        unit.timeout_secs.map(Duration::from_secs).or(self.timeout)
    }
}

fn transition(unit: &str, from: RunState, to: RunState) {
    debug!("{}: {:?} -> {:?}", unit, from, to);
}
