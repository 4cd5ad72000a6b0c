pub mod error;
pub mod config;
pub mod source;
pub mod fingerprint;
pub mod reconcile;
pub mod runner;
pub mod compliance;
pub mod audit;
pub mod alert;
pub mod pipeline;

pub use error::{MigReconError, ExecutorError, ExtractionError, NotificationError, PersistenceError, Result};
pub use config::{ConfigLoader, ConfigValidator, MigrationUnit, PipelineConfig, SourceConfig, AlertsConfig, DEFAULT_CONFIG_FILE};
pub use source::{DataHandle, DataLocator, DataSource, BigQuerySource, LakeSource, MemorySource, Row};
pub use fingerprint::{Fingerprint, FingerprintExtractor, content_digest, DEFAULT_SAMPLE_SIZE};
pub use reconcile::{Reconciler, ReconciliationVerdict};
pub use runner::{CommandExecutor, MigrationRunner, RunRecord, RunState, RunStatus, Side, TransformExecutor};
pub use compliance::{AlertMessage, ComplianceEvaluator, ComplianceStatus, Evaluation};
pub use audit::{AuditLog, AuditRecorder, HistoryRow, AUDIT_COLUMNS};
pub use alert::{AlertChannel, AlertDispatcher, DispatchReport, EmailChannel, WebhookChannel};
pub use pipeline::{build_runner, Pipeline, PipelineReport, UnitOutcome};
