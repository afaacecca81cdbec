//! tdee CLI - Command-line interface for adaptive TDEE
//!
//! Commands:
//! - seed: Formula-based BMR and TDEE for a profile
//! - quality: Data quality metrics for a user record
//! - update: Re-run the filter over a user record's log history
//! - adapt: Run one goal adaptation pass
//! - validate: Check a user record's profile and logs against input bounds
//! - doctor: Diagnose configuration and environment

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, warn};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use adaptive_tdee::formulas::calculate_bmr;
use adaptive_tdee::validation::{validate_log, validate_profile};
use adaptive_tdee::{
    adapt_goal_with, compute_quality, run_full_update_with, seed_estimate, AdaptationReport,
    ComputeError, EngineConfig, UserProfile, UserRecord, ENGINE_VERSION,
};

/// tdee - Adaptive energy expenditure estimation and calorie goal control
#[derive(Parser)]
#[command(name = "tdee")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Estimate TDEE from weight and intake logs and adapt calorie goals", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON); defaults are used for missing fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Formula-based BMR and TDEE for a profile
    Seed {
        /// Profile file path (use - for stdin)
        #[arg(short, long)]
        profile: PathBuf,

        /// Body weight in kilograms
        #[arg(short, long)]
        weight: f64,
    },

    /// Print data quality metrics for a user record
    Quality {
        /// User record file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Re-run preprocessing and the filter over the full log history
    Update {
        /// User record file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path for the updated record (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Run one goal adaptation pass
    Adapt {
        /// User record file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path for the adaptation report (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Run the filter before adapting
        #[arg(long)]
        update: bool,

        /// Timestamp recorded on the audit entry (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Check a user record's profile and logs against input bounds
    Validate {
        /// User record file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Reference date for future-log checks (defaults to today, UTC)
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), TdeeCliError> {
    let config_path = cli.config;

    match cli.command {
        Commands::Seed { profile, weight } => cmd_seed(&profile, weight),

        Commands::Quality {
            input,
            output_format,
        } => cmd_quality(&input, output_format),

        Commands::Update {
            input,
            output,
            output_format,
        } => {
            let config = load_config(config_path.as_deref())?;
            cmd_update(&input, &output, output_format, &config)
        }

        Commands::Adapt {
            input,
            output,
            update,
            at,
            output_format,
        } => {
            let config = load_config(config_path.as_deref())?;
            cmd_adapt(&input, &output, update, at, output_format, &config)
        }

        Commands::Validate { input, today, json } => cmd_validate(&input, today, json),

        Commands::Doctor { json } => cmd_doctor(config_path.as_deref(), json),
    }
}

fn cmd_seed(profile_path: &Path, weight: f64) -> Result<(), TdeeCliError> {
    let profile: UserProfile = serde_json::from_str(&read_input(profile_path)?)?;
    validate_profile(&profile)?;

    let report = SeedReport {
        weight_kg: weight,
        bmr: calculate_bmr(&profile, weight),
        tdee: seed_estimate(&profile, weight),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_quality(input: &Path, output_format: OutputFormat) -> Result<(), TdeeCliError> {
    let record = read_record(input)?;
    let metrics = compute_quality(&record);
    println!("{}", format_output(&metrics, &output_format)?);
    Ok(())
}

fn cmd_update(
    input: &Path,
    output: &Path,
    output_format: OutputFormat,
    config: &EngineConfig,
) -> Result<(), TdeeCliError> {
    let record = read_record(input)?;
    let log_count = record.logs.len();
    let updated = run_full_update_with(record, config);

    if log_count < 2 {
        warn!("fewer than 2 logs; record returned unchanged");
    }

    write_output(output, &format_output(&updated, &output_format)?)
}

fn cmd_adapt(
    input: &Path,
    output: &Path,
    update: bool,
    at: Option<DateTime<Utc>>,
    output_format: OutputFormat,
    config: &EngineConfig,
) -> Result<(), TdeeCliError> {
    let mut record = read_record(input)?;
    if update {
        record = run_full_update_with(record, config);
    }

    let now = at.unwrap_or_else(Utc::now);
    let outcome = adapt_goal_with(&mut record, config, now);
    debug!("adaptation outcome: {:?}", outcome);

    let report = AdaptationReport {
        user: record,
        outcome,
    };
    write_output(output, &format_output(&report, &output_format)?)
}

fn cmd_validate(input: &Path, today: Option<NaiveDate>, json: bool) -> Result<(), TdeeCliError> {
    let record = read_record(input)?;
    let today = today.unwrap_or_else(|| Utc::now().date_naive());

    let mut errors: Vec<ValidationErrorDetail> = Vec::new();
    if let Err(e) = validate_profile(&record.profile) {
        errors.push(ValidationErrorDetail {
            field: "profile".to_string(),
            date: None,
            error: e.to_string(),
        });
    }
    for log in &record.logs {
        if let Err(e) = validate_log(log, today) {
            errors.push(ValidationErrorDetail {
                field: "log".to_string(),
                date: Some(log.date),
                error: e.to_string(),
            });
        }
    }

    let report = ValidationReport {
        user_id: record.user_id.clone(),
        total_logs: record.logs.len(),
        invalid_entries: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("User:            {}", report.user_id);
        println!("Total logs:      {}", report.total_logs);
        println!("Invalid entries: {}", report.invalid_entries);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                match err.date {
                    Some(date) => println!("  - {} {}: {}", err.field, date, err.error),
                    None => println!("  - {}: {}", err.field, err.error),
                }
            }
        }
    }

    if report.invalid_entries > 0 {
        Err(TdeeCliError::ValidationFailed(report.invalid_entries))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), TdeeCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("adaptive-tdee version {}", ENGINE_VERSION),
    });

    match config_path {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist; defaults will be used".to_string(),
        }),
        Some(path) => match load_config(Some(path)) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (min logs {}, cooldown {} days, confidence threshold {:.2})",
                    config.controller.min_logs,
                    config.controller.min_adaptation_interval_days,
                    config.controller.confidence_threshold
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config: {}", CliError::from(e).message),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No config file given; using defaults".to_string(),
        }),
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass records with -i <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (-i - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let logger_check = match std::env::var("RUST_LOG") {
        Ok(level) => DoctorCheck {
            name: "logging".to_string(),
            status: CheckStatus::Ok,
            message: format!("RUST_LOG={}", level),
        },
        Err(_) => DoctorCheck {
            name: "logging".to_string(),
            status: CheckStatus::Ok,
            message: "RUST_LOG not set (errors only)".to_string(),
        },
    };
    checks.push(logger_check);

    let report = DoctorReport {
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("tdee Doctor Report");
        println!("==================");
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(TdeeCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<EngineConfig, TdeeCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn read_input(path: &Path) -> Result<String, TdeeCliError> {
    if path.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            warn!("reading from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn read_record(path: &Path) -> Result<UserRecord, TdeeCliError> {
    Ok(UserRecord::from_json(&read_input(path)?)?)
}

fn write_output(path: &Path, data: &str) -> Result<(), TdeeCliError> {
    if path.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

fn format_output<T: Serialize>(value: &T, format: &OutputFormat) -> Result<String, TdeeCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

// Error types

#[derive(Debug)]
enum TdeeCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    Validation(adaptive_tdee::ValidationError),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for TdeeCliError {
    fn from(e: io::Error) -> Self {
        TdeeCliError::Io(e)
    }
}

impl From<ComputeError> for TdeeCliError {
    fn from(e: ComputeError) -> Self {
        TdeeCliError::Compute(e)
    }
}

impl From<serde_json::Error> for TdeeCliError {
    fn from(e: serde_json::Error) -> Self {
        TdeeCliError::Json(e)
    }
}

impl From<adaptive_tdee::ValidationError> for TdeeCliError {
    fn from(e: adaptive_tdee::ValidationError) -> Self {
        TdeeCliError::Validation(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TdeeCliError> for CliError {
    fn from(e: TdeeCliError) -> Self {
        match e {
            TdeeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TdeeCliError::Compute(ComputeError::ConfigError(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'tdee doctor --config <file>' for details".to_string()),
            },
            TdeeCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input is a valid user record".to_string()),
            },
            TdeeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            TdeeCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'tdee validate' for details".to_string()),
            },
            TdeeCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} entries failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            TdeeCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct SeedReport {
    weight_kg: f64,
    bmr: f64,
    tdee: f64,
}

#[derive(Serialize)]
struct ValidationReport {
    user_id: String,
    total_logs: usize,
    invalid_entries: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    field: String,
    date: Option<NaiveDate>,
    error: String,
}

#[derive(Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
