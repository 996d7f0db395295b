//! Touch analyzer CLI
//!
//! Commands:
//! - stats: Filter a file selection and print event statistics
//! - flicks: List reconstructed flick units and whether each survives the filter
//! - users: List user folders under the data directory
//! - tasks: Show how many tasks the data directory holds
//! - validate: Check CSV files against the required columns

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use touch_analyzer::config::Config;
use touch_analyzer::filter::FilterSpec;
use touch_analyzer::pipeline::{AnalysisOutcome, AnalysisSession};
use touch_analyzer::report;
use touch_analyzer::store::{layout, Loader};
use touch_analyzer::types::TimeRange;
use touch_analyzer::{AnalyzerError, VERSION};

/// Touch analyzer - event statistics for touch-screen interaction logs
#[derive(Parser)]
#[command(name = "touch-analyzer")]
#[command(version = VERSION)]
#[command(about = "Analyze touch, flick and hardware-key events in CSV logs", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "touch_analyzer=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter a file selection and print event statistics
    Stats {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output format (defaults to text on a terminal, json otherwise)
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// List reconstructed flick units
    Flicks {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output format (defaults to text on a terminal, json otherwise)
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// List user folders under the data directory
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the maximum task count under the data directory
    Tasks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate CSV files
    Validate {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// CSV files to combine
    #[arg(long, num_args = 1.., conflicts_with_all = ["user", "task"])]
    files: Vec<PathBuf>,

    /// Users whose task file is selected (repeatable)
    #[arg(long, requires = "task")]
    user: Vec<String>,

    /// Task number (1-based); selects every user when --user is omitted
    #[arg(long)]
    task: Option<usize>,
}

#[derive(Args)]
struct FilterArgs {
    /// Inclusive lower time bound in milliseconds
    #[arg(long)]
    start_ms: Option<i64>,

    /// Inclusive upper time bound in milliseconds
    #[arg(long)]
    end_ms: Option<i64>,

    /// Comma-separated keywords; records whose layer name contains any are dropped
    #[arg(long, default_value = "")]
    exclude: String,
}

impl FilterArgs {
    fn spec(&self) -> FilterSpec {
        let range = TimeRange::new(
            self.start_ms.unwrap_or(i64::MIN),
            self.end_ms.unwrap_or(i64::MAX),
        );
        FilterSpec::from_keyword_text(range, &self.exclude)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable report
    Text,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), TouchCliError> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Stats {
            selection,
            filter,
            format,
        } => cmd_stats(&config, &selection, &filter, resolve_format(format)),

        Commands::Flicks {
            selection,
            filter,
            format,
        } => cmd_flicks(&config, &selection, &filter, resolve_format(format)),

        Commands::Users { json } => cmd_users(&config, json),

        Commands::Tasks { json } => cmd_tasks(&config, json),

        Commands::Validate { files, json } => cmd_validate(&config, &files, json),
    }
}

fn resolve_format(format: Option<OutputFormat>) -> OutputFormat {
    format.unwrap_or_else(|| {
        if atty::is(atty::Stream::Stdout) {
            OutputFormat::Text
        } else {
            OutputFormat::Json
        }
    })
}

fn write_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), TouchCliError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    Ok(())
}

fn load_selection(config: &Config, selection: &SelectionArgs) -> Result<AnalysisSession, TouchCliError> {
    let mut session = AnalysisSession::new(config.clone());
    match selection.task {
        Some(task) => {
            let users = if selection.user.is_empty() {
                layout::list_users(&config.data_dir)?
            } else {
                selection.user.clone()
            };
            session.load_task(task, &users)?;
        }
        None => {
            if selection.files.is_empty() {
                return Err(TouchCliError::NoSelection);
            }
            session.load_files(&selection.files);
        }
    }
    Ok(session)
}

fn cmd_stats(
    config: &Config,
    selection: &SelectionArgs,
    filter: &FilterArgs,
    format: OutputFormat,
) -> Result<(), TouchCliError> {
    let mut session = load_selection(config, selection)?;
    let outcome = session.apply(&filter.spec());

    match &outcome {
        AnalysisOutcome::Unreadable { reason, .. } => {
            return Err(TouchCliError::Unreadable(reason.clone()))
        }
        AnalysisOutcome::NoData => return Err(TouchCliError::NoData),
        _ => {}
    }

    match format {
        OutputFormat::Text => {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{}", report::render_outcome(&outcome, config))?;
        }
        OutputFormat::Json => write_json(&outcome, false)?,
        OutputFormat::JsonPretty => write_json(&outcome, true)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct FlickRow {
    start: usize,
    end: usize,
    start_ms: i64,
    end_ms: i64,
    start_name: String,
    end_name: String,
    direction: &'static str,
    valid: bool,
}

fn cmd_flicks(
    config: &Config,
    selection: &SelectionArgs,
    filter: &FilterArgs,
    format: OutputFormat,
) -> Result<(), TouchCliError> {
    let mut session = load_selection(config, selection)?;
    let outcome = session.apply(&filter.spec());
    match &outcome {
        AnalysisOutcome::Unreadable { reason, .. } => {
            return Err(TouchCliError::Unreadable(reason.clone()))
        }
        AnalysisOutcome::NoData => return Err(TouchCliError::NoData),
        _ => {}
    }
    let flicks = session.flick_index().ok_or(TouchCliError::NoData)?;
    // NoMatches leaves no terminal standing
    let survives = |id| outcome.view().map_or(false, |v| v.filtered().contains(id));

    let rows: Vec<FlickRow> = flicks
        .units()
        .iter()
        .map(|u| FlickRow {
            start: u.start_id.0,
            end: u.end_id.0,
            start_ms: u.start_time_ms,
            end_ms: u.end_time_ms,
            start_name: u.start_name.clone(),
            end_name: u.end_name.clone(),
            direction: u.direction.label(),
            valid: survives(u.end_id),
        })
        .collect();

    match format {
        OutputFormat::Text => {
            let mut stdout = io::stdout().lock();
            for row in &rows {
                writeln!(
                    stdout,
                    "#{:<6} {:>9}ms {:<24} -> #{:<6} {:>9}ms {:<12} {}",
                    row.start,
                    row.start_ms,
                    row.start_name,
                    row.end,
                    row.end_ms,
                    row.direction,
                    if row.valid { "valid" } else { "filtered" }
                )?;
            }
            let valid = rows.iter().filter(|r| r.valid).count();
            writeln!(
                stdout,
                "{} flick units, {} valid, {} orphan swipes",
                rows.len(),
                valid,
                flicks.orphan_swipes()
            )?;
        }
        OutputFormat::Json => write_json(&rows, false)?,
        OutputFormat::JsonPretty => write_json(&rows, true)?,
    }
    Ok(())
}

fn cmd_users(config: &Config, json: bool) -> Result<(), TouchCliError> {
    #[derive(Serialize)]
    struct UserRow {
        user: String,
        files: usize,
    }

    let mut rows = Vec::new();
    for user in layout::list_users(&config.data_dir)? {
        let files = layout::user_file_count(&config.data_dir, &user)?;
        rows.push(UserRow { user, files });
    }

    if json {
        return write_json(&rows, false);
    }
    let mut stdout = io::stdout().lock();
    if rows.is_empty() {
        writeln!(stdout, "No user folders in {}", config.data_dir.display())?;
    }
    for row in &rows {
        writeln!(stdout, "{} ({} files)", row.user, row.files)?;
    }
    Ok(())
}

fn cmd_tasks(config: &Config, json: bool) -> Result<(), TouchCliError> {
    let max_tasks = layout::max_task_count(&config.data_dir)?;
    if json {
        return write_json(&serde_json::json!({ "max_task_count": max_tasks }), false);
    }
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{} task(s) available", max_tasks)?;
    Ok(())
}

#[derive(Serialize)]
struct ValidationResult {
    path: PathBuf,
    valid: bool,
    rows_read: usize,
    rows_kept: usize,
    rows_dropped: usize,
    error_code: Option<String>,
    error: Option<String>,
}

fn validate_file(loader: &Loader, path: &Path) -> ValidationResult {
    match loader.load_file(path) {
        Ok(file) => ValidationResult {
            path: path.to_path_buf(),
            valid: true,
            rows_read: file.report.rows_read,
            rows_kept: file.report.rows_kept,
            rows_dropped: file.report.rows_dropped,
            error_code: None,
            error: None,
        },
        Err(e) => ValidationResult {
            path: path.to_path_buf(),
            valid: false,
            rows_read: 0,
            rows_kept: 0,
            rows_dropped: 0,
            error_code: Some(e.code().to_string()),
            error: Some(e.to_string()),
        },
    }
}

fn cmd_validate(config: &Config, files: &[PathBuf], json: bool) -> Result<(), TouchCliError> {
    let loader = Loader::from_config(config);
    let results: Vec<ValidationResult> = files.iter().map(|f| validate_file(&loader, f)).collect();
    let failed = results.iter().filter(|r| !r.valid).count();

    if json {
        write_json(&results, true)?;
    } else {
        let mut stdout = io::stdout().lock();
        for r in &results {
            match &r.error {
                None => writeln!(
                    stdout,
                    "OK    {} ({} rows, {} dropped)",
                    r.path.display(),
                    r.rows_kept,
                    r.rows_dropped
                )?,
                Some(error) => writeln!(stdout, "FAIL  {}: {}", r.path.display(), error)?,
            }
        }
    }

    if failed > 0 {
        return Err(TouchCliError::ValidationFailed(failed));
    }
    Ok(())
}

// Error handling

#[derive(Debug)]
enum TouchCliError {
    Io(io::Error),
    Analyzer(AnalyzerError),
    Json(serde_json::Error),
    NoSelection,
    NoData,
    Unreadable(String),
    ValidationFailed(usize),
}

impl From<io::Error> for TouchCliError {
    fn from(e: io::Error) -> Self {
        TouchCliError::Io(e)
    }
}

impl From<AnalyzerError> for TouchCliError {
    fn from(e: AnalyzerError) -> Self {
        TouchCliError::Analyzer(e)
    }
}

impl From<serde_json::Error> for TouchCliError {
    fn from(e: serde_json::Error) -> Self {
        TouchCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TouchCliError> for CliError {
    fn from(e: TouchCliError) -> Self {
        match e {
            TouchCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TouchCliError::Analyzer(e) => {
                let hint = match &e {
                    AnalyzerError::Config(_) => "Check the --config file",
                    AnalyzerError::MissingColumns { .. } => {
                        "Files need Time(ms), TouchX, TouchY and Layer Name columns"
                    }
                    _ => "Run 'touch-analyzer validate' for details",
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            TouchCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            TouchCliError::NoSelection => CliError {
                code: "NO_SELECTION".to_string(),
                message: "No files selected".to_string(),
                hint: Some("Pass --files or --task".to_string()),
            },
            TouchCliError::NoData => CliError {
                code: "NO_DATA".to_string(),
                message: report::NO_DATA_MESSAGE.to_string(),
                hint: Some("Check the task number and user names".to_string()),
            },
            TouchCliError::Unreadable(reason) => CliError {
                code: "UNREADABLE".to_string(),
                message: reason,
                hint: Some("Run 'touch-analyzer validate' for details".to_string()),
            },
            TouchCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} file(s) failed validation", count),
                hint: None,
            },
        }
    }
}
