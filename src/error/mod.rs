mod extraction;
mod parser;

use thiserror::Error;

pub use extraction::ExtractionError;
pub use parser::{parse_bq_error, ErrorContext};

#[derive(Error, Debug)]
pub enum MigReconError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(String),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MigReconError>;

/// The transform step itself did not complete.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transform '{unit}' exited with {exit}\n{stderr}")]
    NonZeroExit {
        unit: String,
        exit: String,
        stderr: String,
    },

    #[error("transform '{unit}' timed out after {duration_secs}s")]
    Timeout {
        unit: String,
        duration_secs: u64,
    },

    #[error("transform '{unit}' failed: {message}")]
    Failed {
        unit: String,
        message: String,
    },
}

#[derive(Error, Debug, Clone)]
pub enum PersistenceError {
    #[error("cannot read audit log {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("cannot write audit log {path}: {reason}")]
    Write { path: String, reason: String },
}

#[derive(Error, Debug, Clone)]
#[error("{channel} alert failed: {reason}")]
pub struct NotificationError {
    pub channel: String,
    pub reason: String,
}

impl NotificationError {
    pub fn new(channel: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }
}

/// Renders an error and its full `source()` chain, one cause per line.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}
