mod columns;
mod recorder;
mod table;

pub use columns::AUDIT_COLUMNS;
pub use recorder::{AuditEntry, AuditLog, AuditRecorder};
pub use table::HistoryRow;
