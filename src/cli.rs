//! CLI argument parsing with clap

use crate::config::{Command, Config, CorruptCatalogPolicy, FileOperation, RepairBackend};
use clap::Parser;
use std::path::PathBuf;

/// Album Arrange - camera roll organization tool
///
/// Moves photos and videos into `<project>/<YYYY>/YYYYMM_NNNN.<ext>`,
/// numbering them chronologically and skipping content already in the album.
#[derive(Parser, Debug)]
#[command(name = "album-arrange")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML format)
    ///
    /// Settings from the file are used as defaults; CLI arguments override them.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Source folder to walk through for import
    #[arg(short, long, global = true)]
    pub import_path: Option<PathBuf>,

    /// Folder holding album projects
    #[arg(short, long, global = true, env = "ALBUM_WORK_PATH")]
    pub work_path: Option<PathBuf>,

    /// Album project name
    #[arg(short = 'n', long, global = true)]
    pub project_name: Option<String>,

    /// Album project path (import-project source, split-database target)
    #[arg(short, long, global = true)]
    pub project_path: Option<PathBuf>,

    /// Number of leading bytes hashed per file (minimum 1024)
    #[arg(short = 's', long, global = true)]
    pub hash_size: Option<usize>,

    /// File extensions to keep
    #[arg(short = 't', long = "file-type", global = true, num_args = 1..)]
    pub file_types: Option<Vec<String>>,

    /// Years to rebuild
    #[arg(short, long = "year", global = true, num_args = 1..)]
    pub years: Option<Vec<i32>>,

    /// Restore modification times from capture metadata before import
    #[arg(short, long, global = true)]
    pub repair: bool,

    /// Where capture metadata comes from when repairing
    #[arg(long, global = true, value_enum)]
    pub repair_backend: Option<RepairBackend>,

    /// File operation mode
    #[arg(short = 'O', long, global = true, value_enum)]
    pub operation: Option<FileOperation>,

    /// Put assets into YYYY-MM-DD folders
    #[arg(long, global = true)]
    pub with_date: bool,

    /// What to do with a year catalog that cannot be parsed
    #[arg(long, global = true, value_enum)]
    pub on_corrupt_catalog: Option<CorruptCatalogPolicy>,

    /// Number of threads for fingerprinting (0 = auto)
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Dry run mode - show what would be done without doing it
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output log file as JSON
    #[arg(long, global = true)]
    pub json_log: bool,

    /// Directory for log files (defaults to Log/ next to the executable)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// Merge CLI arguments over `config`
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref import_path) = self.import_path {
            config.import_path = Some(import_path.clone());
        }
        if let Some(ref work_path) = self.work_path {
            config.work_path = work_path.clone();
        }
        if let Some(ref project_name) = self.project_name {
            config.project_name = Some(project_name.clone());
        }
        if let Some(ref project_path) = self.project_path {
            config.project_path = Some(project_path.clone());
        }
        if let Some(hash_size) = self.hash_size {
            config.hash_size = hash_size;
        }
        if let Some(ref file_types) = self.file_types {
            config.extensions = file_types.clone();
        }
        if let Some(ref years) = self.years {
            config.years = years.clone();
        }
        if self.repair {
            config.repair = true;
        }
        if let Some(backend) = self.repair_backend {
            config.repair_backend = backend;
        }
        if let Some(operation) = self.operation {
            config.operation = operation;
        }
        if self.with_date {
            config.date_folders = true;
        }
        if let Some(policy) = self.on_corrupt_catalog {
            config.corrupt_catalog = policy;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.verbose {
            config.verbose = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
