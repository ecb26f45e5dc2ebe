//! Error types for album arrangement

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for album operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for album operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fingerprint {path}: {message}")]
    Fingerprint { path: PathBuf, message: String },

    #[error("Catalog {path} is unreadable: {message}")]
    CorruptCatalog { path: PathBuf, message: String },

    #[error("Destination already exists: {source_path} => {destination}")]
    DestinationExists {
        source_path: PathBuf,
        destination: PathBuf,
    },

    #[error("File name {file_name} is already assigned in the {year} catalog (from {source_path})")]
    SequenceReuse {
        source_path: PathBuf,
        file_name: String,
        year: i32,
    },

    #[error("Aggregate catalog is inconsistent: hash years {hash_years:?} differ from index years {index_years:?}")]
    YearSetMismatch {
        hash_years: Vec<String>,
        index_years: Vec<String>,
    },

    #[error("Year directory does not exist: {path}")]
    MissingYearDirectory { path: PathBuf },

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("exiftool failed: {0}")]
    Exiftool(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
