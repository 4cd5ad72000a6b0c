use std::collections::HashSet;
use super::{PipelineConfig, SourceConfig};

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub code: &'static str,
    pub message: String,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &PipelineConfig) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        Self::check_units_present(config, &mut errors);
        Self::check_duplicate_units(config, &mut errors);
        Self::check_unit_coordinates(config, &mut errors);
        Self::check_sample_sizes(config, &mut errors);
        Self::check_backends(config, &mut errors);
        Self::check_max_parallel(config, &mut errors);
        Self::check_webhook(config, &mut errors);
        Self::check_email(config, &mut errors);
        Self::check_alert_channels(config, &mut warnings);
        Self::check_timeout(config, &mut warnings);

        ValidationResult { errors, warnings }
    }

    fn check_units_present(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
        if config.units.is_empty() {
            errors.push(ValidationError {
                code: "E001",
                message: "no migration units configured".to_string(),
            });
        }
    }

    fn check_duplicate_units(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
        let mut seen = HashSet::new();
        for unit in &config.units {
            let name = unit.name();
            if !seen.insert(name.clone()) {
                errors.push(ValidationError {
                    code: "E002",
                    message: format!("duplicate unit name: {}", name),
                });
            }
        }
    }

    fn check_unit_coordinates(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
        for unit in &config.units {
            if unit.path.trim().is_empty() {
                errors.push(ValidationError {
                    code: "E003",
                    message: "unit with empty transform path".to_string(),
                });
            }
            if unit.source.database.trim().is_empty() || unit.source.table.trim().is_empty() {
                errors.push(ValidationError {
                    code: "E004",
                    message: format!("{}: source database and table are required", unit.name()),
                });
            }
            if unit.target.path.trim().is_empty() {
                errors.push(ValidationError {
                    code: "E005",
                    message: format!("{}: target path is required", unit.name()),
                });
            }
        }
    }

    fn check_sample_sizes(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
        if config.sample_size == 0 {
            errors.push(ValidationError {
                code: "E006",
                message: "sample_size must be at least 1".to_string(),
            });
        }
        for unit in &config.units {
            if unit.sample_size == Some(0) {
                errors.push(ValidationError {
                    code: "E006",
                    message: format!("{}: sample_size must be at least 1", unit.name()),
                });
            }
        }
    }

    fn check_backends(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
        for (side, backend) in [("source", &config.source), ("target", &config.target)] {
            match backend {
                SourceConfig::Bigquery { project } if project.trim().is_empty() => {
                    errors.push(ValidationError {
                        code: "E007",
                        message: format!("{}: bigquery project is required", side),
                    });
                }
                SourceConfig::Lake { root } if root.as_os_str().is_empty() => {
                    errors.push(ValidationError {
                        code: "E007",
                        message: format!("{}: lake root is required", side),
                    });
                }
                _ => {}
            }
        }
    }

    fn check_max_parallel(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
        if config.max_parallel == 0 {
            errors.push(ValidationError {
                code: "E008",
                message: "max_parallel must be at least 1".to_string(),
            });
        }
    }

    fn check_webhook(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
        if let Some(hook) = &config.alerts.webhook {
            if hook.url.is_none() && hook.url_env.is_none() {
                errors.push(ValidationError {
                    code: "E009",
                    message: "webhook channel needs url or url_env".to_string(),
                });
            }
        }
    }

    fn check_email(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
        if let Some(email) = &config.alerts.email {
            if email.to.is_empty() {
                errors.push(ValidationError {
                    code: "E010",
                    message: "email channel has no recipients".to_string(),
                });
            }
            if email.smtp_host.trim().is_empty() {
                errors.push(ValidationError {
                    code: "E011",
                    message: "email channel needs smtp_host".to_string(),
                });
            }
            if email.password_env.is_some() && email.username.is_none() {
                errors.push(ValidationError {
                    code: "E012",
                    message: "email password_env set without username".to_string(),
                });
            }
        }
    }

    fn check_alert_channels(config: &PipelineConfig, warnings: &mut Vec<ValidationWarning>) {
        if config.alerts.is_empty() {
            warnings.push(ValidationWarning {
                code: "W001",
                message: "no alert channels configured; failures will only be logged".to_string(),
            });
        }
    }

    fn check_timeout(config: &PipelineConfig, warnings: &mut Vec<ValidationWarning>) {
        let any_unit_timeout = config.units.iter().any(|u| u.timeout_secs.is_some());
        if config.unit_timeout_secs.is_none() && !any_unit_timeout {
            warnings.push(ValidationWarning {
                code: "W002",
                message: "no unit_timeout_secs set; a hung transform blocks the batch".to_string(),
            });
        }
    }
}
