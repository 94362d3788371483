//! SessionM data generation CLI
//!
//! Combines two customer extracts into the CSV expected by the SessionM import.

use chrono::Local;
use clap::{Parser, ValueEnum};
use sm_core::{CollisionStrategy, PipelineConfig, SessionCipher, DEFAULT_OUTPUT, DEFAULT_SENTINEL};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_PREFIX: &str = "sessionm_data_generation";
const DEFAULT_FILTER: &str = "sm_core=info,sm_cli=info";
const DEFAULT_LOG_DIR: &str = ".";

#[derive(Parser)]
#[command(name = "sm-cli")]
#[command(about = "Clean two customer extracts and build a SessionM-compatible CSV", long_about = None)]
#[command(version)]
struct Cli {
    /// First customer extract (identity and contact fields)
    #[arg(long = "sourcefile1", value_name = "PATH")]
    source_file1: PathBuf,

    /// Second customer extract (phone, tier and last contact fields)
    #[arg(long = "sourcefile2", value_name = "PATH")]
    source_file2: PathBuf,

    /// Output file path
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// How repeated ids in the first extract are rewritten
    #[arg(long, value_enum, default_value_t = OnDuplicate::Sentinel)]
    on_duplicate: OnDuplicate,

    /// Directory for the run's log file
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OnDuplicate {
    /// Collapse every repeat into one shared synthetic id
    Sentinel,
    /// Give every repeat its own suffixed id
    Unique,
}

impl From<OnDuplicate> for CollisionStrategy {
    fn from(value: OnDuplicate) -> Self {
        match value {
            OnDuplicate::Sentinel => CollisionStrategy::Sentinel(DEFAULT_SENTINEL.to_string()),
            OnDuplicate::Unique => CollisionStrategy::RegenerateUnique,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => exit_on_usage_error(e),
    };
    let guard = init_logging(&cli.log_dir, true);

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "program failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    // Flush the file writer before exiting
    drop(guard);
    std::process::exit(code);
}

/// Usage errors go to the log file in the default log directory before clap
/// prints them and exits with its usage code. Help and version output is not
/// logged.
fn exit_on_usage_error(e: clap::Error) -> ! {
    if e.use_stderr() {
        let guard = init_logging(Path::new(DEFAULT_LOG_DIR), false);
        error!(kind = ?e.kind(), "invalid command line: {}", e.render());
        drop(guard);
    }
    e.exit()
}

fn run(cli: &Cli) -> sm_core::Result<()> {
    info!(
        sourcefile1 = %cli.source_file1.display(),
        sourcefile2 = %cli.source_file2.display(),
        output = %cli.output.display(),
        on_duplicate = ?cli.on_duplicate,
        "input params"
    );

    let config = PipelineConfig {
        collision: cli.on_duplicate.into(),
        output: cli.output.clone(),
    };

    // Key lives only as long as this run
    let cipher = SessionCipher::generate();
    let report = sm_core::run(&cli.source_file1, &cli.source_file2, &config, &cipher)?;

    if let Some(path) = &cli.report {
        report.save(path)?;
        info!(path = %path.display(), "wrote run report");
    }

    println!(
        "Process completed successfully. Combined customer data ({} rows) written to {}",
        report.output_rows,
        cli.output.display()
    );
    info!("process completed successfully");
    Ok(())
}

/// Console gets warnings and errors; the timestamped log file gets everything
/// the filter lets through. A log file that cannot be created is reported
/// and skipped.
fn init_logging(log_dir: &Path, console: bool) -> Option<WorkerGuard> {
    let file_name = format!("{}_{}", LOG_PREFIX, Local::now().format("%Y%m%d_%H%M%S"));

    let appender = std::fs::create_dir_all(log_dir)
        .map_err(|e| e.to_string())
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name)
                .filename_suffix("log")
                .build(log_dir)
                .map_err(|e| e.to_string())
        });

    let (file_layer, guard) = match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        Err(e) => {
            eprintln!("Warning: log file disabled: {}", e);
            (None, None)
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console.then(|| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::WARN)
        }))
        .init();

    guard
}
