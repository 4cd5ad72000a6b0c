mod executor;
mod record;
mod runner;

pub use executor::{artifact_path, CommandExecutor, TransformExecutor};
pub use record::{RunRecord, RunStatus};
pub use runner::{MigrationRunner, RunState, Side};
