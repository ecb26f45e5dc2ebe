//! Configuration types for album arrangement

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Smallest accepted fingerprint sample size in bytes
pub const MIN_HASH_SIZE: usize = 1024;

/// Default fingerprint sample size in bytes
pub const DEFAULT_HASH_SIZE: usize = 10 * 1024;

/// File operation used when placing an asset into the album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    /// Copy the source file and leave it in place
    Copy,
    /// Move the source file into the album
    #[default]
    Move,
}

/// What to do when a year catalog exists but cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CorruptCatalogPolicy {
    /// Abort the run
    #[default]
    Fail,
    /// Continue with an empty catalog. Prior dedup history for that year is lost
    /// once the catalog is written back.
    Reset,
}

/// Backend used to recover capture dates before import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RepairBackend {
    /// Read EXIF tags in-process
    #[default]
    Exif,
    /// Shell out to exiftool once for the whole tree
    Exiftool,
}

/// Top-level operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::Subcommand)]
pub enum Command {
    /// Import assets from an arbitrary source tree into an album project
    ImportAssets,
    /// Import assets another album project has that this one lacks
    ImportProject,
    /// Renumber the given years of an album project from scratch
    RebuildOrder,
    /// Split an aggregate catalog into per-year catalogs
    SplitDatabase,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ImportAssets => "import-assets",
            Command::ImportProject => "import-project",
            Command::RebuildOrder => "rebuild-order",
            Command::SplitDatabase => "split-database",
        }
    }
}

/// Configuration for an album run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source tree to import from
    pub import_path: Option<PathBuf>,

    /// Directory holding album projects
    pub work_path: PathBuf,

    /// Album project name under `work_path`
    pub project_name: Option<String>,

    /// Project used by import-project (source) and split-database (target)
    pub project_path: Option<PathBuf>,

    /// Number of leading bytes hashed into a fingerprint
    pub hash_size: usize,

    /// Accepted file extensions, compared case-insensitively
    pub extensions: Vec<String>,

    /// Copy or move assets into the album
    pub operation: FileOperation,

    /// Place assets into `YYYY-MM-DD` folders under the year
    pub date_folders: bool,

    /// Years to rebuild
    pub years: Vec<i32>,

    /// Rewrite modification times from capture metadata before import
    pub repair: bool,

    pub repair_backend: RepairBackend,

    pub corrupt_catalog: CorruptCatalogPolicy,

    /// Number of threads used for fingerprinting (0 = auto)
    pub threads: usize,

    /// Report what would happen without touching files or catalogs
    pub dry_run: bool,

    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            import_path: None,
            work_path: PathBuf::from("."),
            project_name: None,
            project_path: None,
            hash_size: DEFAULT_HASH_SIZE,
            extensions: vec![
                "JPG".into(),
                "MOV".into(),
                "MP4".into(),
                "CR2".into(),
                "HEIC".into(),
            ],
            operation: FileOperation::default(),
            date_folders: false,
            years: vec![],
            repair: false,
            repair_backend: RepairBackend::default(),
            corrupt_catalog: CorruptCatalogPolicy::default(),
            threads: 0,
            dry_run: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Root directory of the destination album project
    pub fn project_root(&self) -> Result<PathBuf, ConfigError> {
        let name = self
            .project_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(ConfigError::Missing("project name"))?;
        Ok(self.work_path.join(name))
    }

    /// Check the preconditions of `command`
    pub fn validate(&self, command: Command) -> Result<(), ConfigError> {
        match command {
            Command::ImportAssets => {
                let import_path = self
                    .import_path
                    .as_ref()
                    .ok_or(ConfigError::Missing("import path"))?;
                require_dir(import_path)?;
                require_dir(&self.work_path)?;
                self.project_root()?;
                self.validate_hash_size()?;
            }
            Command::ImportProject => {
                let project_path = self
                    .project_path
                    .as_ref()
                    .ok_or(ConfigError::Missing("project path"))?;
                require_dir(project_path)?;
                self.project_root()?;
                self.validate_hash_size()?;
            }
            Command::RebuildOrder => {
                self.project_root()?;
                if self.years.is_empty() {
                    return Err(ConfigError::Missing("year"));
                }
                if self.dry_run {
                    return Err(ConfigError::Invalid(
                        "rebuild-order renames year folders and cannot run as a dry run".into(),
                    ));
                }
                self.validate_hash_size()?;
            }
            Command::SplitDatabase => {
                let project_path = self
                    .project_path
                    .as_ref()
                    .ok_or(ConfigError::Missing("project path"))?;
                require_dir(project_path)?;
            }
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid("extension list is empty".into()));
        }
        Ok(())
    }

    fn validate_hash_size(&self) -> Result<(), ConfigError> {
        if self.hash_size < MIN_HASH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "hash size {} is below the minimum of {} bytes",
                self.hash_size, MIN_HASH_SIZE
            )));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }
}

fn require_dir(path: &Path) -> Result<(), ConfigError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::NotADirectory(path.to_path_buf()))
    }
}

/// Errors that can occur when loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("{0}")]
    Invalid(String),
}
