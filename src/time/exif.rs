//! EXIF capture times for images

use super::TimestampSource;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// EXIF tags to try for date extraction, in priority order
const DATE_TAGS: &[Tag] = &[
    Tag::DateTimeOriginal,
    Tag::DateTimeDigitized,
    Tag::DateTime,
];

/// Reads capture times from EXIF metadata
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifTimestampSource;

impl TimestampSource for ExifTimestampSource {
    fn lookup(&self, path: &Path) -> Option<NaiveDateTime> {
        match extract_exif_time(path) {
            Ok(time) => Some(time),
            Err(e) => {
                trace!(?path, error = %e, "No EXIF capture time");
                None
            }
        }
    }
}

/// Extract the capture time from EXIF metadata
pub fn extract_exif_time(path: &Path) -> Result<NaiveDateTime> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::ExifRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    for tag in DATE_TAGS {
        if let Some(field) = exif.get_field(*tag, In::PRIMARY)
            && let Some(datetime) = parse_exif_datetime(&field.display_value().to_string())
        {
            trace!(?path, ?tag, "Found EXIF date");
            return Ok(datetime);
        }
    }

    Err(Error::ExifRead {
        path: path.to_path_buf(),
        message: "No valid date tag found in EXIF data".to_string(),
    })
}

/// Parse EXIF datetime strings: "YYYY:MM:DD HH:MM:SS" and the dashed form
/// kamadak-exif displays
pub(crate) fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches('"');

    let formats = [
        "%Y:%m:%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];

    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}
