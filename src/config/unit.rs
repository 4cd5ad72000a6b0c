use std::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::source::DataLocator;

/// One configured source-table-to-target-table transform job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationUnit {
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub source: SourceCoordinates,
    pub target: TargetCoordinates,
    #[serde(default)]
    pub sample_size: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCoordinates {
    pub database: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCoordinates {
    pub path: String,
}

impl MigrationUnit {
    /// Explicit name, else the transform's file stem.
    pub fn name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        Path::new(&self.path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }

    pub fn source_locator(&self) -> DataLocator {
        DataLocator::table(&self.source.database, &self.source.table)
    }

    pub fn target_locator(&self) -> DataLocator {
        DataLocator::path(&self.target.path)
    }

    pub fn params_display(&self) -> String {
        Value::Object(self.params.clone()).to_string()
    }

    /// Parameters as `(name, value)` strings; string values are passed unquoted.
    pub fn param_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit() -> MigrationUnit {
        serde_yaml::from_str(r#"
path: notebooks/migrate_sales.ipynb
params: { table: sales, batch: 500, full: true }
source: { database: sales_db, table: sales }
target: { path: /mnt/datalake/sales_db/sales }
"#).unwrap()
    }

    #[test]
    fn test_name_defaults_to_file_stem() {
        assert_eq!(unit().name(), "migrate_sales");

        let mut named = unit();
        named.name = Some("sales".into());
        assert_eq!(named.name(), "sales");
    }

    #[test]
    fn test_locators() {
        let u = unit();
        assert_eq!(u.source_locator(), DataLocator::table("sales_db", "sales"));
        assert_eq!(u.target_locator(), DataLocator::path("/mnt/datalake/sales_db/sales"));
    }

    #[test]
    fn test_params_keep_config_order() {
        let keys: Vec<_> = unit().params.keys().cloned().collect();
        assert_eq!(keys, vec!["table", "batch", "full"]);
        assert_eq!(unit().params_display(), r#"{"table":"sales","batch":500,"full":true}"#);
    }

    #[test]
    fn test_param_pairs_render_scalars() {
        let pairs = unit().param_pairs();
        assert_eq!(pairs[0], ("table".to_string(), "sales".to_string()));
        assert_eq!(pairs[1], ("batch".to_string(), "500".to_string()));
        assert_eq!(pairs[2], ("full".to_string(), "true".to_string()));
        assert_eq!(unit().params.get("batch"), Some(&json!(500)));
    }
}
