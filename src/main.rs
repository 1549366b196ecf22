use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use sweep_dups::report::{write_clean_report, write_json, write_scan_outcome, write_sort_report};
use sweep_dups::{
    Cli, Command, Config, clean_directory, find_and_delete_duplicates_until, format_human_elapsed,
    sort_directory,
};

const EXIT_SKIPPED: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

const LOG_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]-[hour][minute][second]");

fn log_file_name(at: OffsetDateTime) -> Result<String> {
    let stamp = at.format(LOG_STAMP).context("Failed to format log timestamp")?;
    Ok(format!("log-{stamp}.txt"))
}

/// `log-YYYYMMDD-HHMMSS.txt` inside `log_dir`.
fn timestamped_log_file(log_dir: &Path) -> Result<PathBuf> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    Ok(log_dir.join(log_file_name(now)?))
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let mut builder = ConfigBuilder::new();
    // Falls back to UTC timestamps when the local offset cannot be determined.
    let _ = builder.set_time_offset_to_local();
    let log_config = builder.set_time_format_rfc3339().build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: '{}'", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file: '{}'", path.display()))?;
        loggers.push(WriteLogger::new(LevelFilter::Debug, log_config, file));
    }
    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    Ok(())
}

fn exit_code(skipped: usize, interrupted: bool) -> ExitCode {
    if interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if skipped > 0 {
        ExitCode::from(EXIT_SKIPPED)
    } else {
        ExitCode::SUCCESS
    }
}

fn main() -> Result<ExitCode> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.logging.verbose |= cli.verbose;

    let log_file = match (&cli.log_file, &config.logging.log_dir) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(dir)) => Some(timestamped_log_file(dir)?),
        (None, None) => None,
    };
    init_logging(config.logging.verbose, log_file.as_deref())?;

    info!("Starting sweep-dups v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);
    if let Some(path) = &log_file {
        info!("Logging to '{}'", path.display());
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let code = match cli.command {
        Command::Dedupe {
            roots,
            dry_run,
            threads,
            min_size,
            json,
        } => {
            let mut options = config.dedupe.clone();
            options.dry_run |= dry_run;
            if let Some(threads) = threads {
                options.threads = threads.max(1);
            }
            if let Some(min_size) = min_size {
                options.min_size = min_size;
            }
            if json {
                options.progress = false;
            }
            if options.dry_run {
                info!("Dry run: nothing will be deleted");
            }

            let outcome = find_and_delete_duplicates_until(&roots, &options, &stop)?;
            if json {
                write_json(&mut out, &outcome)?;
            } else {
                write_scan_outcome(&mut out, &outcome)?;
            }
            exit_code(outcome.skipped.len(), outcome.interrupted)
        }
        Command::CleanTmp { dir, dry_run } => {
            let dir = dir.unwrap_or_else(|| config.housekeeping.tmp_dir());
            let report = clean_directory(&dir, dry_run)?;
            write_clean_report(&mut out, &report)?;
            exit_code(report.failed.len(), false)
        }
        Command::SortFiles { dir, dry_run } => {
            let dir = dir
                .or_else(|| config.housekeeping.sort_dir())
                .context("No directory to sort: pass one or set housekeeping.sort_dir")?;
            let report = sort_directory(&dir, &config.housekeeping.sort_rules, dry_run)?;
            write_sort_report(&mut out, &report)?;
            exit_code(report.skipped.len(), false)
        }
    };

    info!(
        "Program completed in {}",
        format_human_elapsed(start_time.elapsed())
    );
    Ok(code)
}
