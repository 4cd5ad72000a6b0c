use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tabled::{Table, settings::Style};

use migrecon::{ConfigLoader, ConfigValidator, MigrationUnit, Pipeline, PipelineConfig, PipelineReport, Side};
use migrecon::{AuditRecorder, ComplianceStatus, HistoryRow, DEFAULT_CONFIG_FILE};
use migrecon::audit::AuditEntry;
use migrecon::error::{error_chain, ExtractionError, MigReconError};

#[derive(Parser)]
#[command(name = "migrecon")]
#[command(about = "Run warehouse-to-lake migrations and reconcile source against target")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to pipeline configuration
    #[arg(short, long, env = "MIGRECON_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migration units, reconcile, record, and alert
    Run {
        /// Unit name or transform path (runs all if not specified)
        #[arg(short, long)]
        unit: Option<String>,

        /// Dry run - validate and show the plan without executing
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the pipeline configuration
    Validate,

    /// List configured migration units
    List {
        /// Show source/target coordinates and overrides
        #[arg(short, long)]
        detailed: bool,
    },

    /// Fingerprint one side of a unit without running its transform
    Fingerprint {
        /// Unit name or transform path
        #[arg(short, long)]
        unit: String,

        /// Which side to fingerprint
        #[arg(short, long, default_value = "target")]
        side: SideArg,
    },

    /// Show the audit log
    History {
        /// Only entries for this unit name or transform path
        #[arg(short, long)]
        unit: Option<String>,

        /// Only failed or mismatched entries
        #[arg(long)]
        failed_only: bool,

        /// Output format: table, yaml, json
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Yaml,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SideArg {
    Source,
    Target,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Source => Side::Source,
            SideArg::Target => Side::Target,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("migrecon=debug,info")
    } else {
        EnvFilter::new("migrecon=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(e);
            ExitCode::FAILURE
        }
    }
}

fn print_error(err: Box<dyn std::error::Error>) {
    if let Some(MigReconError::Extraction(ext)) = err.downcast_ref::<MigReconError>() {
        print_extraction_error(ext);
        return;
    }
    if let Some(ext) = err.downcast_ref::<ExtractionError>() {
        print_extraction_error(ext);
        return;
    }

    eprintln!("{} {}", "✗ Error:".red(), error_chain(err.as_ref()));
}

fn print_extraction_error(err: &ExtractionError) {
    eprintln!("\n{}", format!("✗ Extraction Error [{}]", err.error_code()).red());
    eprintln!("  {}", err);
    eprintln!("\n{}", "Suggestion:".yellow());
    for line in err.suggestion().lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load(&cli.config)?;

    match cli.command {
        Commands::Run { unit, dry_run } => {
            cmd_run(&config, unit, dry_run).await?;
        }

        Commands::Validate => {
            cmd_validate(&config, &cli.config)?;
        }

        Commands::List { detailed } => {
            cmd_list(&config, detailed);
        }

        Commands::Fingerprint { unit, side } => {
            cmd_fingerprint(&config, &unit, side.into()).await?;
        }

        Commands::History { unit, failed_only, output } => {
            cmd_history(&config, unit, failed_only, output)?;
        }
    }

    Ok(())
}

fn select_units(config: &PipelineConfig, filter: Option<&str>) -> Result<Vec<MigrationUnit>, MigReconError> {
    match filter {
        Some(name) => config
            .find_unit(name)
            .map(|u| vec![u.clone()])
            .ok_or_else(|| MigReconError::UnitNotFound(name.to_string())),
        None => Ok(config.units.clone()),
    }
}

async fn cmd_run(config: &PipelineConfig, unit: Option<String>, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let validation = ConfigValidator::validate(config);
    for w in &validation.warnings {
        warn!("[{}] {}", w.code, w.message);
    }
    if !validation.is_valid() {
        for e in &validation.errors {
            eprintln!("  {} [{}] {}", "✗".red(), e.code, e.message);
        }
        return Err("Configuration is invalid; run 'migrecon validate' for details".into());
    }

    let units = select_units(config, unit.as_deref())?;

    if dry_run {
        println!("Dry run: {} units would execute\n", units.len());
        for u in &units {
            println!("  {} {}", "○".dimmed(), u.name());
            println!("      transform: {}", u.path);
            println!("      params:    {}", u.params_display());
            println!("      source:    {} ({})", u.source_locator(), config.source.kind());
            println!("      target:    {} ({})", u.target_locator(), config.target.kind());
        }
        println!("\nAudit log: {}", config.audit_log.display());
        return Ok(());
    }

    let pipeline = Pipeline::from_config(config).await?;

    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing running units and skipping the rest");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let report = pipeline.run(&units).await;
    print_run_report(&report);

    if let Some(e) = &report.persistence_error {
        return Err(Box::new(MigReconError::Persistence(e.clone())));
    }
    if !report.is_clean() {
        return Err(format!("{} of {} units need attention", report.alerts_raised() + report.skipped.len(), units.len()).into());
    }

    Ok(())
}

fn print_run_report(report: &PipelineReport) {
    println!();
    for outcome in &report.outcomes {
        let record = &outcome.record;
        let status = outcome.evaluation.status;
        let symbol = match status {
            ComplianceStatus::Compliant => status.symbol().green(),
            ComplianceStatus::NonCompliant => status.symbol().yellow(),
            ComplianceStatus::Failed => status.symbol().red(),
        };

        let rows = match (&record.source_fingerprint, &record.target_fingerprint) {
            (Some(s), Some(t)) => format!("{} / {} rows", s.row_count, t.row_count),
            _ => "-".to_string(),
        };
        println!("{} {} ({:.1}s, {}) {}", symbol, record.unit_name, record.duration_sec, rows, status);

        if !record.error.is_empty() {
            for line in record.error.lines().take(3) {
                println!("    {}", line.dimmed());
            }
        }
        if let Some(dispatch) = &outcome.dispatch {
            for failure in &dispatch.failures {
                println!("    {} {}", "alert not delivered:".red(), failure);
            }
        }
    }

    for name in &report.skipped {
        println!("{} {} (skipped)", "○".dimmed(), name);
    }

    println!("\nSummary (run {}):", report.run_id);
    println!("  ✓ {} compliant", report.count(ComplianceStatus::Compliant));
    println!("  ⚠ {} noncompliant", report.count(ComplianceStatus::NonCompliant));
    println!("  ✗ {} failed", report.count(ComplianceStatus::Failed));
    if !report.skipped.is_empty() {
        println!("  ○ {} skipped", report.skipped.len());
    }
    if report.notification_failures() > 0 {
        println!("  {} alert deliveries failed", report.notification_failures());
    }
}

fn cmd_validate(config: &PipelineConfig, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating {}", path.display());

    let result = ConfigValidator::validate(config);

    for unit in &config.units {
        println!("  {} {} -> {}", unit.name(), unit.source_locator(), unit.target_locator());
    }

    for err in &result.errors {
        println!("    {} [{}] {}", "✗".red(), err.code, err.message);
    }
    for warn in &result.warnings {
        println!("    {} [{}] {}", "⚠".yellow(), warn.code, warn.message);
    }

    println!();

    if !result.is_valid() {
        println!("✗ Validation failed: {} errors, {} warnings", result.errors.len(), result.warnings.len());
        return Err("Validation failed".into());
    } else if result.has_warnings() {
        println!("⚠ {} units validated with {} warnings", config.units.len(), result.warnings.len());
    } else {
        println!("✓ {} units validated successfully", config.units.len());
    }

    Ok(())
}

fn cmd_list(config: &PipelineConfig, detailed: bool) {
    if config.units.is_empty() {
        println!("No migration units configured");
        return;
    }

    for unit in &config.units {
        if detailed {
            println!("{}", unit.name());
            println!("  transform: {}", unit.path);
            println!("  params: {}", unit.params_display());
            println!("  source: {} ({})", unit.source_locator(), config.source.kind());
            println!("  target: {} ({})", unit.target_locator(), config.target.kind());
            if let Some(n) = unit.sample_size {
                println!("  sample size: {}", n);
            }
            if let Some(t) = unit.timeout_secs {
                println!("  timeout: {}s", t);
            }
            println!();
        } else {
            println!("{} ({} -> {})", unit.name(), unit.source_locator(), unit.target_locator());
        }
    }
}

async fn cmd_fingerprint(config: &PipelineConfig, unit: &str, side: Side) -> Result<(), Box<dyn std::error::Error>> {
    let unit = config
        .find_unit(unit)
        .ok_or_else(|| MigReconError::UnitNotFound(unit.to_string()))?;

    let runner = migrecon::build_runner(config).await?;
    let locator = match side {
        Side::Source => unit.source_locator(),
        Side::Target => unit.target_locator(),
    };
    info!("Fingerprinting {} {}", side.as_str(), locator);

    let fp = runner.fingerprint(unit, side).await.map_err(MigReconError::from)?;

    println!("{} {}", side.as_str(), locator);
    println!("  rows:   {}", fp.row_count);
    println!("  digest: {}", fp.content_digest);
    println!("  sample: {} of {} rows", fp.sampled_rows, fp.sample_size);

    Ok(())
}

fn is_attention(entry: &AuditEntry<'_>) -> bool {
    entry.get_or_empty("status") == "FAILED"
        || entry.get_or_empty("row_count_match") == "False"
        || entry.get_or_empty("data_quality_match") == "False"
}

fn cmd_history(
    config: &PipelineConfig,
    unit: Option<String>,
    failed_only: bool,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = AuditRecorder::new(&config.audit_log);
    let log = recorder.load()?;

    let notebook = match &unit {
        Some(name) => Some(
            config.find_unit(name)
                .map(|u| u.path.clone())
                .unwrap_or_else(|| name.clone()),
        ),
        None => None,
    };

    let entries: Vec<AuditEntry<'_>> = log
        .entries()
        .filter(|e| notebook.as_deref().map_or(true, |nb| e.get_or_empty("notebook") == nb))
        .filter(|e| !failed_only || is_attention(e))
        .collect();

    if entries.is_empty() {
        println!("No audit entries in {}", recorder.path().display());
        return Ok(());
    }

    match output {
        OutputFormat::Yaml => {
            let maps: Vec<_> = entries.iter().map(|e| e.to_map()).collect();
            println!("{}", serde_yaml::to_string(&maps)?);
        }
        OutputFormat::Json => {
            let maps: Vec<_> = entries.iter().map(|e| e.to_map()).collect();
            println!("{}", serde_json::to_string_pretty(&maps)?);
        }
        OutputFormat::Table => {
            println!("\nMigration History ({})\n", recorder.path().display());

            let rows: Vec<HistoryRow> = entries.iter().map(HistoryRow::from).collect();
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);

            let attention = entries.iter().filter(|e| is_attention(e)).count();
            println!("\nSummary:");
            println!("  {} entries", entries.len());
            println!("  {} failed or mismatched", attention);
        }
    }

    Ok(())
}
