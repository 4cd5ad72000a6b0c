mod loader;
mod unit;
mod validator;

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::error::{MigReconError, Result};
use crate::fingerprint::DEFAULT_SAMPLE_SIZE;

pub use loader::ConfigLoader;
pub use unit::{MigrationUnit, SourceCoordinates, TargetCoordinates};
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};

pub const DEFAULT_CONFIG_FILE: &str = "migrecon.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default)]
    pub unit_timeout_secs: Option<u64>,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default)]
    pub executor: ExecutorConfig,
    pub source: SourceConfig,
    pub target: SourceConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    pub units: Vec<MigrationUnit>,
}

impl PipelineConfig {
    pub fn find_unit(&self, name: &str) -> Option<&MigrationUnit> {
        self.units.iter().find(|u| u.name() == name || u.path == name)
    }
}

fn default_audit_log() -> PathBuf {
    PathBuf::from("migration_monitoring_log.csv")
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("executed_notebooks")
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

fn default_max_parallel() -> usize {
    1
}

/// External command that runs one transform, papermill-style:
/// `<program> <args..> <input> <output> -p <key> <value> ...`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_program() -> String {
    "papermill".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Bigquery { project: String },
    Lake { root: PathBuf },
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Bigquery { .. } => "bigquery",
            SourceConfig::Lake { .. } => "lake",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

impl AlertsConfig {
    pub fn is_empty(&self) -> bool {
        self.webhook.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_env: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    10
}

impl WebhookConfig {
    pub fn resolve_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        match &self.url_env {
            Some(var) => std::env::var(var).map_err(|_| {
                MigReconError::Config(format!("webhook url env var '{}' is not set", var))
            }),
            None => Err(MigReconError::Config("webhook requires url or url_env".into())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub starttls: bool,
    pub from: String,
    pub to: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
}

fn default_smtp_port() -> u16 {
    25
}

fn default_subject() -> String {
    "Migration Compliance Alert".to_string()
}

impl EmailConfig {
    pub fn resolve_password(&self) -> Result<Option<String>> {
        match &self.password_env {
            Some(var) => std::env::var(var).map(Some).map_err(|_| {
                MigReconError::Config(format!("smtp password env var '{}' is not set", var))
            }),
            None => Ok(None),
        }
    }
}
