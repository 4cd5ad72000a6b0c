use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use crate::error::PersistenceError;
use crate::runner::RunRecord;
use super::columns::{merge_headers, record_values};

/// Every persisted row, in file order, under the file's header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLog {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl AuditLog {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = AuditEntry<'_>> {
        self.rows.iter().map(move |row| AuditEntry {
            headers: &self.headers,
            values: row,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuditEntry<'a> {
    headers: &'a [String],
    values: &'a [String],
}

impl<'a> AuditEntry<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.values.get(i))
            .map(|v| v.as_str())
    }

    pub fn get_or_empty(&self, column: &str) -> &'a str {
        self.get(column).unwrap_or("")
    }

    /// Column-ordered view for json and yaml output.
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.headers
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect()
    }
}

/// Append-only CSV audit log.
///
/// Each append reads the whole file, concatenates the new rows, and
/// replaces the file through a temp-file rename. Appends from one process
/// are serialized.
pub struct AuditRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or empty file is an empty log; anything unreadable is an error.
    pub fn load(&self) -> Result<AuditLog, PersistenceError> {
        if !self.path.exists() {
            debug!("audit log {} does not exist yet", self.path.display());
            return Ok(AuditLog::default());
        }

        let read_err = |reason: String| PersistenceError::Read {
            path: self.path.display().to_string(),
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| read_err(e.to_string()))?;

        let mut headers: Vec<String> = reader
            .headers()
            .map_err(|e| read_err(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Ok(AuditLog::default());
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| read_err(e.to_string()))?;
            rows.push(record.iter().map(|v| v.to_string()).collect::<Vec<String>>());
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if width > headers.len() {
            warn!(
                "audit log {} has rows wider than its header; adding {} placeholder columns",
                self.path.display(),
                width - headers.len(),
            );
            widen_headers(&mut headers, width);
        }
        for row in &mut rows {
            row.resize(headers.len(), String::new());
        }

        Ok(AuditLog { headers, rows })
    }

    /// Persists `records` after every previously stored row. Returns the
    /// total number of rows now in the log.
    pub fn append(&self, records: &[RunRecord]) -> Result<usize, PersistenceError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let existing = self.load()?;
        let headers = merge_headers(&existing.headers);

        let mut rows: Vec<Vec<String>> = existing
            .rows
            .into_iter()
            .map(|mut row| {
                row.resize(headers.len(), String::new());
                row
            })
            .collect();

        for record in records {
            let values = record_values(record);
            let row = headers
                .iter()
                .map(|h| {
                    values.iter()
                        .find(|(name, _)| name == h)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()
                })
                .collect();
            rows.push(row);
        }

        self.write_all(&headers, &rows)?;
        info!("Appended {} run records to {} ({} total)", records.len(), self.path.display(), rows.len());
        Ok(rows.len())
    }

    fn write_all(&self, headers: &[String], rows: &[Vec<String>]) -> Result<(), PersistenceError> {
        let write_err = |reason: String| PersistenceError::Write {
            path: self.path.display().to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }

        let tmp = self.tmp_path();
        {
            let mut writer = csv::Writer::from_path(&tmp).map_err(|e| write_err(e.to_string()))?;
            writer.write_record(headers).map_err(|e| write_err(e.to_string()))?;
            for row in rows {
                writer.write_record(row).map_err(|e| write_err(e.to_string()))?;
            }
            writer.flush().map_err(|e| write_err(e.to_string()))?;
        }

        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            write_err(e.to_string())
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "audit.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Names unlabeled trailing cells `extra_1`, `extra_2`, ... so they survive a rewrite.
fn widen_headers(headers: &mut Vec<String>, width: usize) {
    let mut n = 0;
    while headers.len() < width {
        n += 1;
        let name = format!("extra_{}", n);
        if !headers.contains(&name) {
            headers.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;
    use crate::runner::RunStatus;

    fn record(notebook: &str, status: RunStatus, minute: u32) -> RunRecord {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap();
        RunRecord {
            run_id: "run-1".into(),
            unit_name: notebook.trim_end_matches(".ipynb").into(),
            notebook: notebook.into(),
            params: "{}".into(),
            start_time: start,
            end_time: start + chrono::Duration::seconds(5),
            duration_sec: 5.0,
            status,
            error: if status == RunStatus::Failed { "boom".into() } else { String::new() },
            output_artifact: format!("executed/{}", notebook),
            verdict: None,
            source_fingerprint: None,
            target_fingerprint: None,
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let recorder = AuditRecorder::new(tmp.path().join("log.csv"));
        assert!(recorder.load().unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.csv");
        fs::write(&path, "").unwrap();
        assert!(AuditRecorder::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn test_short_rows_are_padded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.csv");
        fs::write(&path, "notebook,status,error\na.ipynb,SUCCESS\n").unwrap();

        let log = AuditRecorder::new(&path).load().unwrap();
        assert_eq!(log.rows[0], vec!["a.ipynb", "SUCCESS", ""]);
        assert_eq!(log.entries().next().unwrap().get("error"), Some(""));
    }

    #[test]
    fn test_tmp_path_is_sibling() {
        let recorder = AuditRecorder::new("logs/migration_monitoring_log.csv");
        assert_eq!(recorder.tmp_path(), PathBuf::from("logs/migration_monitoring_log.csv.tmp"));
    }

    #[test]
    fn test_append_nothing_creates_header_only_file() {
        let tmp = TempDir::new().unwrap();
        let recorder = AuditRecorder::new(tmp.path().join("nested/log.csv"));
        assert_eq!(recorder.append(&[]).unwrap(), 0);

        let log = recorder.load().unwrap();
        assert!(log.is_empty());
        assert_eq!(log.headers.first().map(String::as_str), Some("notebook"));
    }

    #[test]
    fn test_wide_rows_keep_unlabeled_cells() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.csv");
        fs::write(&path, "notebook,status\na.ipynb,SUCCESS,extra_cell\nb.ipynb,FAILED\n").unwrap();
        let recorder = AuditRecorder::new(&path);

        let log = recorder.load().unwrap();
        assert_eq!(log.headers, vec!["notebook", "status", "extra_1"]);
        assert_eq!(log.rows[0], vec!["a.ipynb", "SUCCESS", "extra_cell"]);
        assert_eq!(log.rows[1], vec!["b.ipynb", "FAILED", ""]);

        recorder.append(&[record("c.ipynb", RunStatus::Success, 0)]).unwrap();

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("extra_cell"));
        let log = recorder.load().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.entries().next().unwrap().get("extra_1"), Some("extra_cell"));
        assert_eq!(log.entries().nth(2).unwrap().get("notebook"), Some("c.ipynb"));
    }

    #[test]
    fn test_placeholder_names_skip_existing_columns() {
        let mut headers: Vec<String> = vec!["notebook".into(), "extra_1".into()];
        widen_headers(&mut headers, 4);
        assert_eq!(headers, vec!["notebook", "extra_1", "extra_2", "extra_3"]);
    }

    #[test]
    fn test_successive_appends_equal_one_combined_append() {
        let tmp = TempDir::new().unwrap();
        let r1 = record("a.ipynb", RunStatus::Success, 0);
        let r2 = record("b.ipynb", RunStatus::Failed, 1);

        let split = AuditRecorder::new(tmp.path().join("split.csv"));
        split.append(std::slice::from_ref(&r1)).unwrap();
        split.append(std::slice::from_ref(&r2)).unwrap();

        let combined = AuditRecorder::new(tmp.path().join("combined.csv"));
        combined.append(&[r1, r2]).unwrap();

        assert_eq!(split.load().unwrap(), combined.load().unwrap());
    }
}
