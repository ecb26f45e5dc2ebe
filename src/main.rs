//! Album Arrange - chronological camera roll organizer
//!
//! Moves photos and videos into a year-partitioned album project, numbering
//! them by capture time and skipping content the album already holds.

use album_arrange::{Cli, Config, Processor};
use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli_output {
    //! Colored run summary for the terminal

    use album_arrange::process::{FileResult, ProcessingStats};
    use album_arrange::{Command, ProcessingStatus};
    use crossterm::{
        QueueableCommand,
        style::{Color, Print, PrintStyledContent, Stylize},
    };
    use std::io::{self, Write, stdout};
    use std::path::Path;

    const WIDTH: usize = 60;

    const SUCCESS: Color = Color::Green;
    const WARNING: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const HINT: Color = Color::DarkGrey;
    const ACCENT: Color = Color::Cyan;

    /// Left padding that centers `title` in the summary width
    pub fn title_padding(title: &str) -> usize {
        WIDTH.saturating_sub(title.chars().count()) / 2
    }

    fn rule(out: &mut impl Write) -> io::Result<()> {
        out.queue(Print(format!("{}\n", "─".repeat(WIDTH))))?;
        Ok(())
    }

    fn stat(out: &mut impl Write, key: &str, value: usize, color: Color) -> io::Result<()> {
        out.queue(PrintStyledContent(format!("  {:<18}", key).with(HINT)))?;
        out.queue(PrintStyledContent(value.to_string().with(color).bold()))?;
        out.queue(Print("\n"))?;
        Ok(())
    }

    /// Marker, color and trailing text for one file line
    fn describe(result: &FileResult) -> (&'static str, Color, String) {
        let destination = result
            .destination
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        match result.status {
            ProcessingStatus::Placed => ("✓", SUCCESS, format!("→ {}", destination)),
            ProcessingStatus::DryRun => ("~", ACCENT, format!("→ {}", destination)),
            ProcessingStatus::Duplicate => ("≡", WARNING, format!("duplicate of {}", destination)),
            ProcessingStatus::AlreadyPresent => ("⊘", WARNING, "already present".to_string()),
            ProcessingStatus::Missing => ("✗", ERROR, "missing on disk".to_string()),
        }
    }

    /// Print counters, per-file lines when `verbose`, and the log location
    pub fn print_summary(
        command: Command,
        stats: &ProcessingStats,
        results: &[FileResult],
        verbose: bool,
        dry_run: bool,
        log_path: &Path,
    ) -> io::Result<()> {
        let mut out = stdout().lock();
        let title = format!("{} complete", command.name());

        rule(&mut out)?;
        out.queue(Print(" ".repeat(title_padding(&title))))?;
        out.queue(PrintStyledContent(title.bold()))?;
        out.queue(Print("\n"))?;
        rule(&mut out)?;

        stat(&mut out, "Candidates", stats.candidates, ACCENT)?;
        stat(&mut out, "Placed", stats.placed, SUCCESS)?;
        stat(&mut out, "Duplicates", stats.duplicates, WARNING)?;
        if command == Command::ImportProject {
            stat(&mut out, "Already present", stats.already_present, WARNING)?;
            stat(&mut out, "Missing", stats.missing, ERROR)?;
        }
        if stats.repaired > 0 {
            stat(&mut out, "Repaired", stats.repaired, ACCENT)?;
        }
        stat(&mut out, "Catalogs written", stats.catalogs_written, SUCCESS)?;

        if verbose && !results.is_empty() {
            rule(&mut out)?;
            for result in results {
                let (marker, color, detail) = describe(result);
                out.queue(PrintStyledContent(marker.with(color).bold()))?;
                out.queue(Print(format!(" {} ", result.source.display())))?;
                out.queue(PrintStyledContent(detail.with(HINT)))?;
                out.queue(Print("\n"))?;
            }
        }

        if dry_run {
            rule(&mut out)?;
            out.queue(PrintStyledContent("⚠ ".with(WARNING).bold()))?;
            out.queue(Print("Dry run: no files were moved and no catalogs were written\n"))?;
        }

        rule(&mut out)?;
        out.queue(PrintStyledContent("Log file: ".with(HINT)))?;
        out.queue(Print(format!("{}\n", log_path.display())))?;
        out.flush()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let exe_dir = get_executable_dir()?;
    let (config, config_file) = load_config(&cli, &exe_dir)?;

    let log_path = get_log_path(&exe_dir, &cli);
    let _guard = setup_logging(config.verbose, cli.json_log, &log_path)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = cli.command.name(),
        "Album Arrange starting"
    );
    if let Some(config_file) = config_file {
        info!(config_file = %config_file.display(), "Configuration loaded from file");
    }
    if config.verbose {
        info!(?config, "Configuration loaded");
    }
    info!(log_file = %log_path.display(), "Log file location");

    let dry_run = config.dry_run;
    let verbose = config.verbose;
    let mut processor = Processor::new(config);

    match processor.run(cli.command) {
        Ok(results) => {
            cli_output::print_summary(
                cli.command,
                processor.stats(),
                &results,
                verbose,
                dry_run,
                &log_path,
            )?;
            info!(log_file = %log_path.display(), "Processing complete. Log saved to");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Processing failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Log file path: `<log dir>/<command>_<timestamp>.log`
fn get_log_path(exe_dir: &Path, cli: &Cli) -> PathBuf {
    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| exe_dir.join("Log"));
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    log_dir.join(format!("{}_{}.log", cli.command.name(), timestamp))
}

/// Resolve config path - supports shorthand syntax
///
/// Tries the path as given, then with a `.toml` extension, then inside the
/// `Config/` folder next to the executable.
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file or CLI arguments
///
/// Returns the resolved config file path, if one was used.
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<(Config, Option<PathBuf>)> {
    match cli.config {
        Some(ref config_path) => {
            let resolved_path = resolve_config_path(exe_dir, config_path);
            let file_config = Config::load_from_file(&resolved_path)?;
            Ok((cli.merge_with_config(file_config), Some(resolved_path)))
        }
        None => Ok((cli.to_config(), None)),
    }
}

/// Setup logging (file + console)
fn setup_logging(verbose: bool, json_log: bool, log_path: &Path) -> Result<WorkerGuard> {
    let level = if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(guard)
}
