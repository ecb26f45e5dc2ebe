//! Capture times and timestamp repair
//!
//! Assets are ordered by their filesystem timestamps. Cameras and copy tools
//! often leave those wrong, so an import can first rewrite each file's
//! modification time from its capture metadata through a [`TimestampSource`]:
//! - [`exif::ExifTimestampSource`] reads EXIF tags in-process
//! - [`exiftool::ExiftoolTimestampSource`] asks an external exiftool

pub mod exif;
pub mod exiftool;

use crate::error::Result;
use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone};
use filetime::FileTime;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Filesystem timestamps of an asset, in local time
///
/// Ordering compares `created` first and falls back to `modified` when two
/// assets were created at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CaptureTime {
    /// Birth time, or the modification time where the platform has none
    pub created: DateTime<Local>,
    /// Modification time; year, month and date folder derive from it
    pub modified: DateTime<Local>,
}

impl CaptureTime {
    /// Read the timestamps of `path`
    pub fn read(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        let modified: DateTime<Local> = metadata.modified()?.into();
        let created = match metadata.created() {
            Ok(created) => created.into(),
            Err(_) => {
                debug!(?path, "Birth time unavailable, using modification time");
                modified
            }
        };
        Ok(Self { created, modified })
    }

    pub fn year(&self) -> i32 {
        self.modified.year()
    }

    pub fn month(&self) -> u32 {
        self.modified.month()
    }

    /// Year-month label such as `202305`
    pub fn label(&self) -> String {
        format!("{:04}{:02}", self.year(), self.month())
    }

    /// Date folder name such as `2023-05-01`
    pub fn date_folder(&self) -> String {
        self.modified.format("%Y-%m-%d").to_string()
    }
}

/// Anything that can tell the capture time of a file
pub trait TimestampSource {
    /// Capture time of `path`, if known
    fn lookup(&self, path: &Path) -> Option<NaiveDateTime>;
}

impl TimestampSource for HashMap<PathBuf, NaiveDateTime> {
    fn lookup(&self, path: &Path) -> Option<NaiveDateTime> {
        self.get(path).copied()
    }
}

/// Rewrite access and modification times of `paths` from `source`
///
/// Files the source knows nothing about are left alone. Returns the number
/// of files updated.
pub fn repair_timestamps(paths: &[PathBuf], source: &dyn TimestampSource) -> Result<usize> {
    let mut repaired = 0;

    for path in paths {
        let Some(captured) = source.lookup(path) else {
            debug!(?path, "No capture time available");
            continue;
        };

        let Some(local) = Local.from_local_datetime(&captured).earliest() else {
            warn!(?path, %captured, "Capture time does not exist in local time zone");
            continue;
        };

        let time = FileTime::from_system_time(local.into());
        filetime::set_file_times(path, time, time)?;
        info!("{} => {}", path.display(), captured.format("%Y-%m-%dT%H:%M:%S"));
        repaired += 1;
    }

    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn naive(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_label_and_date_folder() {
        let modified = Local.from_local_datetime(&naive(2023, 5, 1)).single().unwrap();
        let time = CaptureTime {
            created: modified,
            modified,
        };
        assert_eq!(time.year(), 2023);
        assert_eq!(time.label(), "202305");
        assert_eq!(time.date_folder(), "2023-05-01");
    }

    #[test]
    fn test_ordering_prefers_created() {
        let early = Local.from_local_datetime(&naive(2023, 1, 1)).single().unwrap();
        let late = Local.from_local_datetime(&naive(2023, 6, 1)).single().unwrap();

        let a = CaptureTime {
            created: early,
            modified: late,
        };
        let b = CaptureTime {
            created: late,
            modified: early,
        };
        assert!(a < b);

        let c = CaptureTime {
            created: early,
            modified: early,
        };
        assert!(c < a);
    }

    #[test]
    fn test_repair_sets_modification_time() {
        let dir = tempdir().unwrap();
        let known = dir.path().join("known.jpg");
        let unknown = dir.path().join("unknown.jpg");
        fs::write(&known, b"a").unwrap();
        fs::write(&unknown, b"b").unwrap();

        let mut source = HashMap::new();
        source.insert(known.clone(), naive(2019, 7, 4));

        let repaired = repair_timestamps(&[known.clone(), unknown.clone()], &source).unwrap();
        assert_eq!(repaired, 1);

        let time = CaptureTime::read(&known).unwrap();
        assert_eq!(time.label(), "201907");
        assert_eq!(time.date_folder(), "2019-07-04");
        assert_ne!(CaptureTime::read(&unknown).unwrap().year(), 2019);
    }
}
