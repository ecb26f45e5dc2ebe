//! Album Arrange - chronological camera roll organizer
//!
//! This library moves photos and videos from a camera roll into an album
//! project laid out as `<project>/<YYYY>/YYYYMM_NNNN.<ext>` with support for:
//! - Content fingerprinting (xxHash over a leading sample) for deduplication
//! - Per-year JSON catalogs of fingerprints and sequence counters
//! - Live-photo companions sharing one sequence number
//! - Timestamp repair from EXIF metadata or exiftool
//! - Cross-project import, year renumbering and catalog splitting
//! - Parallel fingerprinting with Rayon

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod merge;
pub mod placement;
pub mod process;
pub mod scan;
pub mod time;

pub use catalog::{Catalog, CatalogRepository, CatalogStore};
pub use cli::Cli;
pub use config::{Command, Config, ConfigError, CorruptCatalogPolicy, FileOperation, RepairBackend};
pub use error::{Error, Result};
pub use process::{ProcessingStatus, Processor};
