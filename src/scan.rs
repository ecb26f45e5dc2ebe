//! Candidate discovery in a source tree

use crate::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Walks a source tree for assets with allowed extensions
///
/// Symbolic links and dotfiles are never returned.
#[derive(Debug, Clone)]
pub struct Scanner {
    extensions: HashSet<String>,
}

impl Scanner {
    /// Create a scanner accepting `extensions` (case-insensitive, no leading dot)
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Whether `path` has an allowed extension and is not a dotfile
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with('.') {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }

    /// Collect candidate assets under `root` in traversal order
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if entry.path_is_symlink() || !entry.file_type().is_file() {
                continue;
            }
            if self.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }

        debug!(root = %root.display(), count = files.len(), "Scanned source tree");
        Ok(files)
    }
}
