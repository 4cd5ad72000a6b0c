use std::path::{Path, PathBuf};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::debug;
use crate::config::{ExecutorConfig, MigrationUnit};
use crate::error::ExecutorError;

const STDERR_TAIL_LINES: usize = 40;

/// Runs a unit's transform and reports where its execution artifact landed.
#[async_trait]
pub trait TransformExecutor: Send + Sync {
    async fn execute(&self, unit: &MigrationUnit, artifact: &Path) -> Result<String, ExecutorError>;
}

/// `<artifact_dir>/<stem>_<YYYYmmdd_HHMMSS>.<ext>`, keeping the transform's extension.
pub fn artifact_path(artifact_dir: &Path, transform: &str, started_at: DateTime<Utc>) -> PathBuf {
    let transform = Path::new(transform);
    let stem = transform
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transform".to_string());
    let stamp = started_at.format("%Y%m%d_%H%M%S");

    let file_name = match transform.extension() {
        Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, stamp),
    };
    artifact_dir.join(file_name)
}

/// Spawns an external notebook/script runner, papermill-style.
pub struct CommandExecutor {
    config: ExecutorConfig,
}

impl CommandExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, unit: &MigrationUnit, artifact: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(&unit.path)
            .arg(artifact);

        for (name, value) in unit.param_pairs() {
            cmd.arg("-p").arg(name).arg(value);
        }

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TransformExecutor for CommandExecutor {
    async fn execute(&self, unit: &MigrationUnit, artifact: &Path) -> Result<String, ExecutorError> {
        if let Some(parent) = artifact.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| ExecutorError::Failed {
                unit: unit.name(),
                message: format!("cannot create artifact dir {}: {}", parent.display(), e),
            })?;
        }

        let mut cmd = self.build_command(unit, artifact);
        debug!("executing {:?}", cmd.as_std());

        let output = cmd.output().await.map_err(|source| ExecutorError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ExecutorError::NonZeroExit {
                unit: unit.name(),
                exit: output.status.to_string(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES),
            });
        }

        Ok(artifact.display().to_string())
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn unit() -> MigrationUnit {
        serde_yaml::from_str(r#"
path: notebooks/migrate_sales.ipynb
params: { table: sales, limit: 10 }
source: { database: sales_db, table: sales }
target: { path: sales_db/sales }
"#).unwrap()
    }

    #[test]
    fn test_artifact_path_naming() {
        let at = Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 5).unwrap();
        let path = artifact_path(Path::new("executed_notebooks"), "notebooks/migrate_sales.ipynb", at);
        assert_eq!(path, PathBuf::from("executed_notebooks/migrate_sales_20240615_103005.ipynb"));
    }

    #[test]
    fn test_artifact_path_without_extension() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = artifact_path(Path::new("out"), "jobs/copy_orders", at);
        assert_eq!(path, PathBuf::from("out/copy_orders_20240102_030405"));
    }

    #[test]
    fn test_command_line_layout() {
        let executor = CommandExecutor::new(ExecutorConfig {
            program: "papermill".into(),
            args: vec!["--log-output".into()],
            working_dir: None,
        });
        let cmd = executor.build_command(&unit(), Path::new("out/x.ipynb"));
        let args: Vec<String> = cmd.as_std().get_args().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(cmd.as_std().get_program(), "papermill");
        assert_eq!(args, vec![
            "--log-output", "notebooks/migrate_sales.ipynb", "out/x.ipynb",
            "-p", "table", "sales", "-p", "limit", "10",
        ]);
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail("only", 5), "only");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let executor = CommandExecutor::new(ExecutorConfig {
            program: "migrecon-test-no-such-binary".into(),
            args: vec![],
            working_dir: None,
        });

        let err = executor.execute(&unit(), &tmp.path().join("x.ipynb")).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Spawn { .. }));
    }
}
