use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};
use crate::alert::{AlertDispatcher, DispatchReport};
use crate::audit::AuditRecorder;
use crate::compliance::{AlertMessage, ComplianceEvaluator, ComplianceStatus, Evaluation};
use crate::config::{MigrationUnit, PipelineConfig};
use crate::error::{PersistenceError, Result};
use crate::runner::{CommandExecutor, MigrationRunner, RunRecord};
use crate::source;

#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub record: RunRecord,
    pub evaluation: Evaluation,
    /// `None` when the unit was compliant and nothing was sent.
    pub dispatch: Option<DispatchReport>,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub run_id: String,
    pub outcomes: Vec<UnitOutcome>,
    /// Units never started because the run was cancelled.
    pub skipped: Vec<String>,
    pub persistence_error: Option<PersistenceError>,
}

impl PipelineReport {
    pub fn count(&self, status: ComplianceStatus) -> usize {
        self.outcomes.iter().filter(|o| o.evaluation.status == status).count()
    }

    pub fn alerts_raised(&self) -> usize {
        self.outcomes.iter().filter(|o| o.evaluation.should_alert).count()
    }

    pub fn notification_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.dispatch.as_ref())
            .map(|d| d.failures.len())
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.alerts_raised() == 0 && self.persistence_error.is_none() && self.skipped.is_empty()
    }
}

/// Runs units, persists every record, then alerts on the ones that need it.
pub struct Pipeline {
    runner: Arc<MigrationRunner>,
    recorder: Arc<AuditRecorder>,
    dispatcher: AlertDispatcher,
    max_parallel: usize,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(runner: MigrationRunner, recorder: AuditRecorder, dispatcher: AlertDispatcher) -> Self {
        Self {
            runner: Arc::new(runner),
            recorder: Arc::new(recorder),
            dispatcher,
            max_parallel: 1,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn from_config(config: &PipelineConfig) -> Result<Self> {
        let runner = build_runner(config).await?;

        let dispatcher = AlertDispatcher::from_config(&config.alerts)?;
        if dispatcher.is_empty() {
            warn!("No alert channels configured; noncompliant runs will only be logged");
        } else {
            info!("Alert channels: {}", dispatcher.channel_names().join(", "));
        }

        Ok(Self::new(runner, AuditRecorder::new(&config.audit_log), dispatcher)
            .with_max_parallel(config.max_parallel))
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn runner(&self) -> &MigrationRunner {
        &self.runner
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    /// Setting the flag stops new units from starting; units already
    /// running finish and are still recorded.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub async fn run(&self, units: &[MigrationUnit]) -> PipelineReport {
        info!("Starting run {} over {} units", self.runner.run_id(), units.len());

        let (records, skipped) = if self.max_parallel > 1 && units.len() > 1 {
            self.run_parallel(units).await
        } else {
            self.run_sequential(units).await
        };

        let persistence_error = match self.persist(&records).await {
            Ok(_) => None,
            Err(e) => {
                error!("Failed to persist {} run records: {}", records.len(), e);
                Some(e)
            }
        };

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let evaluation = ComplianceEvaluator::evaluate(&record);
            let dispatch = if evaluation.should_alert {
                warn!("{} {}: {}", evaluation.status.symbol(), record.unit_name, evaluation.status);
                Some(self.dispatcher.dispatch(&AlertMessage::from_record(&record)).await)
            } else {
                info!("{} {}: {}", evaluation.status.symbol(), record.unit_name, evaluation.status);
                None
            };
            outcomes.push(UnitOutcome { record, evaluation, dispatch });
        }

        if !skipped.is_empty() {
            warn!("Run cancelled; {} units not started", skipped.len());
        }

        PipelineReport {
            run_id: self.runner.run_id().to_string(),
            outcomes,
            skipped,
            persistence_error,
        }
    }

    /// The audit append rewrites the whole file with blocking IO, so it runs
    /// off the async workers.
    async fn persist(&self, records: &[RunRecord]) -> std::result::Result<usize, PersistenceError> {
        let recorder = self.recorder.clone();
        let batch = records.to_vec();
        tokio::task::spawn_blocking(move || recorder.append(&batch))
            .await
            .unwrap_or_else(|e| Err(PersistenceError::Write {
                path: self.recorder.path().display().to_string(),
                reason: format!("append task failed: {}", e),
            }))
    }

    async fn run_sequential(&self, units: &[MigrationUnit]) -> (Vec<RunRecord>, Vec<String>) {
        let mut records = Vec::with_capacity(units.len());
        let mut skipped = Vec::new();

        for unit in units {
            if self.cancel.load(Ordering::SeqCst) {
                skipped.push(unit.name());
                continue;
            }
            records.push(run_guarded(self.runner.clone(), unit.clone()).await);
        }

        (records, skipped)
    }

    async fn run_parallel(&self, units: &[MigrationUnit]) -> (Vec<RunRecord>, Vec<String>) {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks = JoinSet::new();

        for (idx, unit) in units.iter().cloned().enumerate() {
            let runner = self.runner.clone();
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                if cancel.load(Ordering::SeqCst) {
                    return (idx, None);
                }
                (idx, Some(run_guarded(runner, unit).await))
            });
        }

        let mut slots: Vec<Option<RunRecord>> = vec![None; units.len()];
        let mut started = vec![false; units.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, record)) => {
                    started[idx] = record.is_some();
                    slots[idx] = record;
                }
                Err(e) => error!("Unit task aborted: {}", e),
            }
        }

        let skipped = units
            .iter()
            .zip(&started)
            .filter(|(_, started)| !**started)
            .map(|(unit, _)| unit.name())
            .collect();

        (slots.into_iter().flatten().collect(), skipped)
    }
}

/// Runs one unit on its own task so a panic inside the executor or a data
/// source still yields a `FAILED` record for that unit.
async fn run_guarded(runner: Arc<MigrationRunner>, unit: MigrationUnit) -> RunRecord {
    let task_runner = runner.clone();
    let task_unit = unit.clone();
    match tokio::spawn(async move { task_runner.run(&task_unit).await }).await {
        Ok(record) => record,
        Err(e) => {
            let message = task_failure(e);
            error!("{}: {}", unit.name(), message);
            runner.failed_record(&unit, message)
        }
    }
}

fn task_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("unit task aborted: {}", err);
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("unit task panicked: {}", detail)
}

/// Connects both stores and wires the configured command executor.
pub async fn build_runner(config: &PipelineConfig) -> Result<MigrationRunner> {
    let source = source::connect(&config.source).await?;
    let target = source::connect(&config.target).await?;
    let executor = Arc::new(CommandExecutor::new(config.executor.clone()));

    Ok(MigrationRunner::new(executor, source, target)
        .with_artifact_dir(&config.artifact_dir)
        .with_sample_size(config.sample_size)
        .with_timeout(config.unit_timeout_secs.map(Duration::from_secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use crate::error::ExecutorError;
    use crate::runner::TransformExecutor;
    use crate::source::{DataLocator, MemorySource, Row};

    struct CountingExecutor {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TransformExecutor for CountingExecutor {
        async fn execute(&self, _unit: &MigrationUnit, artifact: &Path) -> std::result::Result<String, ExecutorError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(artifact.display().to_string())
        }
    }

    fn units(n: usize) -> Vec<MigrationUnit> {
        (0..n)
            .map(|i| serde_yaml::from_str(&format!(r#"
path: notebooks/migrate_t{i}.ipynb
source: {{ database: db, table: t{i} }}
target: {{ path: db/t{i} }}
"#)).unwrap())
            .collect()
    }

    fn stores(n: usize) -> (Arc<MemorySource>, Arc<MemorySource>) {
        let source = Arc::new(MemorySource::new());
        let target = Arc::new(MemorySource::new());
        for i in 0..n {
            let rows: Vec<Row> = (0..5).map(|r| Row::new().with("id", r)).collect();
            source.insert(DataLocator::table("db", format!("t{}", i)), rows.clone());
            target.insert(DataLocator::path(format!("db/t{}", i)), rows);
        }
        (source, target)
    }

    fn pipeline(dir: &TempDir, executor: Arc<CountingExecutor>, n: usize) -> Pipeline {
        let (source, target) = stores(n);
        let runner = MigrationRunner::new(executor, source, target)
            .with_artifact_dir(dir.path().join("artifacts"));
        Pipeline::new(runner, AuditRecorder::new(dir.path().join("log.csv")), AlertDispatcher::default())
    }

    struct PanickingExecutor {
        on: &'static str,
    }

    #[async_trait]
    impl TransformExecutor for PanickingExecutor {
        async fn execute(&self, unit: &MigrationUnit, artifact: &Path) -> std::result::Result<String, ExecutorError> {
            if unit.name() == self.on {
                panic!("kernel died while running {}", self.on);
            }
            Ok(artifact.display().to_string())
        }
    }

    fn panicking_pipeline(dir: &TempDir, on: &'static str) -> Pipeline {
        let (source, target) = stores(3);
        let runner = MigrationRunner::new(Arc::new(PanickingExecutor { on }), source, target)
            .with_artifact_dir(dir.path().join("artifacts"));
        Pipeline::new(runner, AuditRecorder::new(dir.path().join("log.csv")), AlertDispatcher::default())
    }

    fn executor() -> Arc<CountingExecutor> {
        Arc::new(CountingExecutor { in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0) })
    }

    #[tokio::test]
    async fn test_parallel_respects_limit_and_order() {
        let tmp = TempDir::new().unwrap();
        let exec = executor();
        let pipeline = pipeline(&tmp, exec.clone(), 6).with_max_parallel(2);

        let report = pipeline.run(&units(6)).await;

        assert!(exec.peak.load(Ordering::SeqCst) <= 2);
        let names: Vec<_> = report.outcomes.iter().map(|o| o.record.unit_name.clone()).collect();
        let expected: Vec<_> = (0..6).map(|i| format!("migrate_t{}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(report.count(ComplianceStatus::Compliant), 6);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline(&tmp, executor(), 3);
        pipeline.cancel_handle().store(true, Ordering::SeqCst);

        let report = pipeline.run(&units(3)).await;

        assert!(report.outcomes.is_empty());
        assert_eq!(report.skipped.len(), 3);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_records_share_run_id() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline(&tmp, executor(), 2);

        let report = pipeline.run(&units(2)).await;
        assert!(report.outcomes.iter().all(|o| o.record.run_id == report.run_id));
        assert_eq!(pipeline.recorder().load().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_parallel_panicking_unit_is_failed_record() {
        let tmp = TempDir::new().unwrap();
        let pipeline = panicking_pipeline(&tmp, "migrate_t1").with_max_parallel(2);

        let report = pipeline.run(&units(3)).await;

        assert!(report.skipped.is_empty());
        assert_eq!(report.outcomes.len(), 3);
        let failed = &report.outcomes[1].record;
        assert_eq!(failed.unit_name, "migrate_t1");
        assert!(failed.is_failed());
        assert!(failed.error.contains("kernel died while running migrate_t1"));
        assert_eq!(report.count(ComplianceStatus::Compliant), 2);
        assert_eq!(pipeline.recorder().load().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sequential_panicking_unit_does_not_stop_the_run() {
        let tmp = TempDir::new().unwrap();
        let pipeline = panicking_pipeline(&tmp, "migrate_t0");

        let report = pipeline.run(&units(3)).await;

        assert!(report.skipped.is_empty());
        let statuses: Vec<_> = report.outcomes.iter().map(|o| o.record.is_failed()).collect();
        assert_eq!(statuses, vec![true, false, false]);
        assert_eq!(report.alerts_raised(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_persists_on_single_threaded_runtime() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline(&tmp, executor(), 2).with_max_parallel(2);

        let report = pipeline.run(&units(2)).await;

        assert!(report.persistence_error.is_none());
        let log = pipeline.recorder().load().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries().next().unwrap().get("run_id"), Some(report.run_id.as_str()));
    }
}
