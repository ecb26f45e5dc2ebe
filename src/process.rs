//! Run orchestration
//!
//! Wires the collaborators and engines together for each command:
//! - import-assets: scan, optionally repair timestamps, then import
//! - import-project: import what another project has and this one lacks
//! - rebuild-order: re-import a year folder from scratch
//! - split-database: split an aggregate catalog per year
//!
//! Every import runs dedup, then placement, then writes the changed catalogs
//! once. A fatal error returns before any catalog is written.

use crate::catalog::{CatalogRepository, CatalogStore};
use crate::config::{Command, Config, FileOperation, RepairBackend};
use crate::dedup::{self, DuplicateOf};
use crate::error::{Error, Result};
use crate::merge;
use crate::placement::{PlacementOptions, Placer};
use crate::scan::Scanner;
use crate::time::exif::ExifTimestampSource;
use crate::time::exiftool::ExiftoolTimestampSource;
use crate::time::{TimestampSource, repair_timestamps};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info, span, warn};

/// Result of handling a single file
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Source file path
    pub source: PathBuf,
    /// Album path, or the catalog name / earlier source it duplicates
    pub destination: Option<PathBuf>,
    pub status: ProcessingStatus,
}

/// Status of file processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// Copied or moved into the album
    Placed,
    /// Skipped, fingerprint already known
    Duplicate,
    /// Skipped by import-project, destination already has it
    AlreadyPresent,
    /// Listed in a source catalog but not found on disk
    Missing,
    /// Dry run - would have been placed
    DryRun,
}

/// Processing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub candidates: usize,
    pub placed: usize,
    pub duplicates: usize,
    pub already_present: usize,
    pub missing: usize,
    pub repaired: usize,
    pub catalogs_written: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> String {
        format!(
            "Candidates: {}, Placed: {}, Duplicates: {}, Already present: {}, Missing: {}, Catalogs written: {}",
            self.candidates,
            self.placed,
            self.duplicates,
            self.already_present,
            self.missing,
            self.catalogs_written
        )
    }
}

/// Runs album commands for one configuration
pub struct Processor {
    config: Config,
    stats: ProcessingStats,
    timestamp_source: Option<Box<dyn TimestampSource>>,
}

impl Processor {
    /// Create a new processor with the given configuration
    pub fn new(config: Config) -> Self {
        if config.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build_global()
                .ok(); // Ignore if already initialized
        }

        Self {
            config,
            stats: ProcessingStats::new(),
            timestamp_source: None,
        }
    }

    /// Use `source` for timestamp repair instead of the configured backend
    pub fn with_timestamp_source(mut self, source: Box<dyn TimestampSource>) -> Self {
        self.timestamp_source = Some(source);
        self
    }

    /// Get processing statistics reference
    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Run `command`
    pub fn run(&mut self, command: Command) -> Result<Vec<FileResult>> {
        let _span = span!(Level::INFO, "run", command = command.name()).entered();
        self.config
            .validate(command)
            .map_err(|e| Error::Config(e.to_string()))?;

        let results = match command {
            Command::ImportAssets => {
                let import_path = self
                    .config
                    .import_path
                    .clone()
                    .ok_or_else(|| Error::Config("missing import path".into()))?;
                self.import_assets(&import_path)?
            }
            Command::ImportProject => {
                let project_path = self
                    .config
                    .project_path
                    .clone()
                    .ok_or_else(|| Error::Config("missing project path".into()))?;
                self.import_project(&project_path)?
            }
            Command::RebuildOrder => self.rebuild_order()?,
            Command::SplitDatabase => {
                let project_path = self
                    .config
                    .project_path
                    .clone()
                    .ok_or_else(|| Error::Config("missing project path".into()))?;
                let written = merge::split_catalog(&project_path)?;
                self.stats.catalogs_written += written.len();
                Vec::new()
            }
        };

        info!("{}", self.stats.summary());
        Ok(results)
    }

    /// Import every accepted asset found under `import_path`
    pub fn import_assets(&mut self, import_path: &Path) -> Result<Vec<FileResult>> {
        info!(import_path = %import_path.display(), "Scanning source tree...");
        let scanner = Scanner::new(&self.config.extensions);
        let paths = scanner.scan(import_path)?;
        info!(count = paths.len(), "Found candidate assets");

        if self.config.repair {
            self.repair(import_path, &paths)?;
        }

        self.import(&paths, self.config.operation)
    }

    /// Import the assets of another project whose fingerprints this one lacks
    ///
    /// Files are always copied out of the source project.
    pub fn import_project(&mut self, source_root: &Path) -> Result<Vec<FileResult>> {
        let project_root = self.project_root()?;
        let mut destination = CatalogRepository::new(
            CatalogStore::new(&project_root),
            self.config.corrupt_catalog,
        );
        let plan = merge::plan_project_import(source_root, &mut destination)?;

        let mut results = Vec::new();
        for path in plan.present {
            self.stats.already_present += 1;
            results.push(FileResult {
                source: path,
                destination: None,
                status: ProcessingStatus::AlreadyPresent,
            });
        }
        for path in plan.missing {
            self.stats.missing += 1;
            results.push(FileResult {
                source: path,
                destination: None,
                status: ProcessingStatus::Missing,
            });
        }

        results.extend(self.import(&plan.queued, FileOperation::Copy)?);
        Ok(results)
    }

    /// Renumber each configured year folder from scratch
    ///
    /// The year folder is renamed to `<year>_temp`, imported back through the
    /// regular pipeline and the temp folder is removed afterwards. An
    /// interrupted rebuild leaves the assets under the temp name.
    pub fn rebuild_order(&mut self) -> Result<Vec<FileResult>> {
        let store = CatalogStore::new(self.project_root()?);
        let mut results = Vec::new();

        for year in self.config.years.clone() {
            let year_dir = store.year_dir(year);
            if !year_dir.is_dir() {
                warn!(year_dir = %year_dir.display(), "Year folder does not exist, skipping");
                continue;
            }

            let temp_dir = store.root().join(format!("{:04}_temp", year));
            if temp_dir.exists() {
                warn!(temp_dir = %temp_dir.display(), "Removing stale rebuild folder");
                fs::remove_dir_all(&temp_dir)?;
            }

            fs::rename(&year_dir, &temp_dir)?;
            info!(year, from = %temp_dir.display(), "Rebuilding year");

            results.extend(self.import_assets(&temp_dir)?);
            fs::remove_dir_all(&temp_dir)?;
        }

        Ok(results)
    }

    fn project_root(&self) -> Result<PathBuf> {
        self.config
            .project_root()
            .map_err(|e| Error::Config(e.to_string()))
    }

    fn repair(&mut self, root: &Path, paths: &[PathBuf]) -> Result<()> {
        let repaired = match &self.timestamp_source {
            Some(source) => repair_timestamps(paths, &**source)?,
            None => match self.config.repair_backend {
                RepairBackend::Exif => repair_timestamps(paths, &ExifTimestampSource)?,
                RepairBackend::Exiftool => {
                    repair_timestamps(paths, &ExiftoolTimestampSource::scan(root)?)?
                }
            },
        };
        info!(repaired, "Repaired modification times");
        self.stats.repaired += repaired;
        Ok(())
    }

    /// Dedup, order and place `paths`, then persist changed catalogs
    fn import(&mut self, paths: &[PathBuf], operation: FileOperation) -> Result<Vec<FileResult>> {
        let project_root = self.project_root()?;
        if !self.config.dry_run {
            fs::create_dir_all(&project_root)?;
        }

        self.stats.candidates += paths.len();
        let mut catalogs = CatalogRepository::new(
            CatalogStore::new(&project_root),
            self.config.corrupt_catalog,
        );

        let survey = dedup::survey(paths, self.config.hash_size, &mut catalogs)?;

        let mut results = Vec::with_capacity(paths.len());
        for duplicate in survey.duplicates {
            self.stats.duplicates += 1;
            let destination = match duplicate.existing {
                DuplicateOf::Catalog(name) => PathBuf::from(name),
                DuplicateOf::Batch(path) => path,
            };
            results.push(FileResult {
                source: duplicate.path,
                destination: Some(destination),
                status: ProcessingStatus::Duplicate,
            });
        }

        let mut placer = Placer::new(PlacementOptions {
            operation,
            date_folders: self.config.date_folders,
            dry_run: self.config.dry_run,
        });
        let status = if self.config.dry_run {
            ProcessingStatus::DryRun
        } else {
            ProcessingStatus::Placed
        };

        for placement in placer.place_all(&survey.accepted, &mut catalogs)? {
            self.stats.placed += 1;
            results.push(FileResult {
                source: placement.source,
                destination: Some(placement.destination),
                status,
            });
        }

        if self.config.dry_run {
            info!("Dry run, catalogs left untouched");
        } else {
            let written = catalogs.persist()?;
            self.stats.catalogs_written += written.len();
        }

        Ok(results)
    }
}
