use std::path::{Path, PathBuf};
use async_trait::async_trait;
use glob::{glob, Pattern};
use serde_json::Value;
use crate::error::ExtractionError;
use super::{DataHandle, DataLocator, DataSource, Row};

const PART_EXTENSIONS: &[&str] = &["json", "jsonl", "ndjson"];

/// Lake tables stored as newline-delimited JSON part files under a directory.
///
/// Natural order is part files sorted by path, then line order within each
/// file. Paths with a component starting with `_` or `.` (transaction logs,
/// checkpoints, hidden files) are not data.
#[derive(Debug, Clone)]
pub struct LakeSource {
    root: PathBuf,
}

impl LakeSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &DataLocator) -> PathBuf {
        match locator {
            DataLocator::Path { path } => {
                let p = Path::new(path);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    self.root.join(p)
                }
            }
            DataLocator::Table { database, table } => self.root.join(database).join(table),
        }
    }

    fn part_files(dir: &Path, locator: &str) -> Result<Vec<PathBuf>, ExtractionError> {
        let pattern = Path::new(&Pattern::escape(&dir.to_string_lossy())).join("**").join("*");
        let pattern_str = pattern.to_string_lossy();

        let entries = glob(&pattern_str).map_err(|e| ExtractionError::Malformed {
            locator: locator.to_string(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ExtractionError::Unreachable {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
            if path.is_file() && is_data_file(dir, &path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

fn is_data_file(dir: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    let hidden = relative.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name.starts_with('_') || name.starts_with('.')
    });
    let ext_ok = path.extension()
        .map(|e| PART_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false);
    !hidden && ext_ok
}

#[async_trait]
impl DataSource for LakeSource {
    fn backend(&self) -> &'static str {
        "lake"
    }

    async fn open(&self, locator: &DataLocator) -> Result<Box<dyn DataHandle>, ExtractionError> {
        let dir = self.resolve(locator);
        let display = dir.display().to_string();

        if !dir.is_dir() {
            return Err(ExtractionError::NotFound { locator: display });
        }

        let files = Self::part_files(&dir, &display)?;
        Ok(Box::new(LakeHandle { files }))
    }
}

struct LakeHandle {
    files: Vec<PathBuf>,
}

impl LakeHandle {
    async fn read(&self, path: &Path) -> Result<String, ExtractionError> {
        tokio::fs::read_to_string(path).await.map_err(|e| ExtractionError::Unreachable {
            locator: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl DataHandle for LakeHandle {
    async fn count_rows(&self) -> Result<u64, ExtractionError> {
        let mut count = 0u64;
        for file in &self.files {
            let content = self.read(file).await?;
            count += content.lines().filter(|l| !l.trim().is_empty()).count() as u64;
        }
        Ok(count)
    }

    async fn sample_rows(&self, limit: usize) -> Result<Vec<Row>, ExtractionError> {
        let mut rows = Vec::with_capacity(limit);
        if limit == 0 {
            return Ok(rows);
        }

        for file in &self.files {
            let content = self.read(file).await?;
            for (idx, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }

                let value: Value = serde_json::from_str(line).map_err(|e| ExtractionError::Malformed {
                    locator: format!("{}:{}", file.display(), idx + 1),
                    message: e.to_string(),
                })?;

                match value {
                    Value::Object(map) => rows.push(Row::from(map)),
                    other => {
                        return Err(ExtractionError::Malformed {
                            locator: format!("{}:{}", file.display(), idx + 1),
                            message: format!("expected a JSON object, found {}", other),
                        });
                    }
                }

                if rows.len() >= limit {
                    return Ok(rows);
                }
            }
        }

        Ok(rows)
    }
}
