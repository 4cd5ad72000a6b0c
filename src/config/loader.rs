use std::fs;
use std::path::Path;
use crate::error::{MigReconError, Result};
use super::PipelineConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: impl AsRef<Path>) -> Result<PipelineConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|_| MigReconError::ConfigFileNotFound(path.display().to_string()))?;

        Self::load_str(&content)
    }

    pub fn load_str(content: &str) -> Result<PipelineConfig> {
        let config: PipelineConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"
source: {{ kind: lake, root: /data/src }}
target: {{ kind: lake, root: /data/dst }}
units:
  - path: notebooks/migrate_customers.ipynb
    source: {{ database: cust_db, table: customers }}
    target: {{ path: cust_db/customers }}
"#).unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.units.len(), 1);
        assert_eq!(config.units[0].name(), "migrate_customers");
        assert!(config.units[0].params.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load("/nonexistent/migrecon.yaml").unwrap_err();
        assert!(matches!(err, MigReconError::ConfigFileNotFound(_)));
    }

    #[test]
    fn test_missing_required_field_is_yaml_error() {
        let err = ConfigLoader::load_str("units: []").unwrap_err();
        assert!(matches!(err, MigReconError::Yaml(_)));
    }

    #[test]
    fn test_unknown_source_kind_rejected() {
        let err = ConfigLoader::load_str(r#"
source: { kind: teradata, host: td }
target: { kind: lake, root: /x }
units: []
"#).unwrap_err();
        assert!(matches!(err, MigReconError::Yaml(_)));
    }
}
