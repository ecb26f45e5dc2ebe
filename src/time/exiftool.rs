//! Capture times reported by an external exiftool

use super::TimestampSource;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Trailing `YYYY:MM:DD HH:MM:SS` of an exiftool tag line
static DATE_PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

fn date_pattern() -> Result<&'static Regex> {
    DATE_PATTERN
        .get_or_init(|| Regex::new(r"(\d{4}:\d{2}:\d{2} \d{2}:\d{2}:\d{2})$"))
        .as_ref()
        .map_err(|e| Error::Pattern(e.clone()))
}

/// Header exiftool prints before each file's tags
const FILE_HEADER: &str = "======== ";

/// Capture times collected by one exiftool run over a tree
#[derive(Debug, Default, Clone)]
pub struct ExiftoolTimestampSource {
    times: HashMap<PathBuf, NaiveDateTime>,
}

impl ExiftoolTimestampSource {
    /// Run exiftool recursively over `root` and collect CreateDate values
    pub fn scan(root: &Path) -> Result<Self> {
        let output = Command::new("exiftool")
            .args(["-r", "-e", "-n", "-createdate"])
            .arg(root)
            .output()
            .map_err(|e| Error::Exiftool(format!("failed to execute exiftool: {}", e)))?;

        // exiftool exits non-zero when some files have no tags; keep what it printed
        if !output.status.success() {
            debug!(
                status = ?output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "exiftool reported problems"
            );
        }

        let times = parse_exiftool_output(&String::from_utf8_lossy(&output.stdout))?;
        info!(root = %root.display(), files = times.len(), "Collected capture times with exiftool");
        Ok(Self { times })
    }
}

impl TimestampSource for ExiftoolTimestampSource {
    fn lookup(&self, path: &Path) -> Option<NaiveDateTime> {
        self.times.get(path).copied()
    }
}

/// Parse exiftool's per-file listing
///
/// A file header is followed by at most one tag line; headers whose next
/// line carries no date are skipped.
pub fn parse_exiftool_output(output: &str) -> Result<HashMap<PathBuf, NaiveDateTime>> {
    let pattern = date_pattern()?;
    let mut times = HashMap::new();
    let mut lines = output.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(path) = line.strip_prefix(FILE_HEADER) else {
            continue;
        };

        let Some(captures) = lines.peek().and_then(|next| pattern.captures(next.trim_end()))
        else {
            continue;
        };

        if let Ok(time) = NaiveDateTime::parse_from_str(&captures[1], "%Y:%m:%d %H:%M:%S") {
            times.insert(PathBuf::from(path), time);
        }
        lines.next();
    }

    Ok(times)
}
