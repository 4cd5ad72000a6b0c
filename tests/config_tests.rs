use migrecon::config::{ConfigLoader, ConfigValidator, SourceConfig};
use migrecon::DataLocator;
use std::path::{Path, PathBuf};

fn fixture() -> PathBuf {
    Path::new("tests/fixtures").join("migrecon.yaml")
}

#[test]
fn test_load_fixture_config() {
    let config = ConfigLoader::load(fixture()).unwrap();

    assert_eq!(config.audit_log, PathBuf::from("logs/migration_monitoring_log.csv"));
    assert_eq!(config.max_parallel, 2);
    assert_eq!(config.unit_timeout_secs, Some(3600));
    assert_eq!(config.executor.args, vec!["--log-output"]);
    assert!(matches!(config.source, SourceConfig::Bigquery { ref project } if project == "acme-warehouse"));
    assert!(matches!(config.target, SourceConfig::Lake { .. }));
    assert!(config.alerts.webhook.is_some());
    assert_eq!(config.alerts.email.as_ref().unwrap().smtp_port, 25);
}

#[test]
fn test_fixture_units() {
    let config = ConfigLoader::load(fixture()).unwrap();
    let names: Vec<_> = config.units.iter().map(|u| u.name()).collect();
    assert_eq!(names, vec!["migrate_sales", "migrate_customers"]);

    let sales = config.find_unit("migrate_sales").unwrap();
    assert_eq!(sales.source_locator(), DataLocator::table("sales_db", "sales"));
    assert_eq!(sales.target_locator(), DataLocator::path("/mnt/datalake/sales_db/sales"));
    assert_eq!(sales.params_display(), r#"{"table":"sales","limit":1000}"#);

    let customers = config.find_unit("notebooks/migrate_customers.ipynb").unwrap();
    assert_eq!(customers.sample_size, Some(25));
    assert_eq!(customers.timeout_secs, Some(600));
}

#[test]
fn test_fixture_validates_cleanly() {
    let config = ConfigLoader::load(fixture()).unwrap();
    let result = ConfigValidator::validate(&config);

    assert!(result.is_valid(), "unexpected errors: {:?}", result.errors);
    assert!(!result.has_warnings());
}

#[test]
fn test_invalid_config_reports_codes() {
    let config = ConfigLoader::load_str(r#"
sample_size: 0
max_parallel: 0
source: { kind: bigquery, project: "" }
target: { kind: lake, root: /mnt/datalake }
alerts:
  webhook: {}
units:
  - path: notebooks/a.ipynb
    source: { database: db, table: "" }
    target: { path: db/a }
  - path: other/a.ipynb
    source: { database: db, table: b }
    target: { path: db/b }
"#).unwrap();

    let result = ConfigValidator::validate(&config);
    let codes: Vec<_> = result.errors.iter().map(|e| e.code).collect();

    for code in ["E002", "E004", "E006", "E007", "E008", "E009"] {
        assert!(codes.contains(&code), "missing {} in {:?}", code, codes);
    }
    assert!(result.warnings.iter().any(|w| w.code == "W002"));
}
