//! Per-year catalogs
//!
//! Each year folder of an album project holds a `database.json` with two
//! sections:
//! - `index`: year-month label => next sequence number to allocate
//! - `hash`: fingerprint => file name assigned in the album
//!
//! [`CatalogStore`] reads and writes those documents. [`CatalogRepository`]
//! is the run-scoped cache the engines share: catalogs are loaded on first
//! use and written back once, at the end of a run, if they changed.

use crate::config::CorruptCatalogPolicy;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Catalog file name inside every year folder
pub const CATALOG_FILENAME: &str = "database.json";

/// On-disk shape of a catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    index: BTreeMap<String, u32>,
    #[serde(default)]
    hash: BTreeMap<String, String>,
}

/// Hash index and sequence index for one year
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "CatalogDocument", into = "CatalogDocument")]
pub struct Catalog {
    index: BTreeMap<String, u32>,
    hash: BTreeMap<String, String>,
    /// Every file name present in `hash`
    names: HashSet<String>,
}

impl From<CatalogDocument> for Catalog {
    fn from(doc: CatalogDocument) -> Self {
        let names = doc.hash.values().cloned().collect();
        Self {
            index: doc.index,
            hash: doc.hash,
            names,
        }
    }
}

impl From<Catalog> for CatalogDocument {
    fn from(catalog: Catalog) -> Self {
        Self {
            index: catalog.index,
            hash: catalog.hash,
        }
    }
}

impl PartialEq for Catalog {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.hash == other.hash
    }
}

impl Eq for Catalog {}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from raw sections
    pub fn from_parts(index: BTreeMap<String, u32>, hash: BTreeMap<String, String>) -> Self {
        CatalogDocument { index, hash }.into()
    }

    /// Sequence index: label => next sequence
    pub fn index(&self) -> &BTreeMap<String, u32> {
        &self.index
    }

    /// Hash index: fingerprint => assigned file name
    pub fn hashes(&self) -> &BTreeMap<String, String> {
        &self.hash
    }

    /// File name already assigned to `fingerprint`, if any
    pub fn lookup(&self, fingerprint: &str) -> Option<&str> {
        self.hash.get(fingerprint).map(String::as_str)
    }

    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.hash.contains_key(fingerprint)
    }

    /// Whether some fingerprint already resolves to `file_name`
    pub fn is_name_assigned(&self, file_name: &str) -> bool {
        self.names.contains(file_name)
    }

    /// Next sequence the label would hand out
    pub fn next_sequence(&self, label: &str) -> u32 {
        self.index.get(label).copied().unwrap_or(1)
    }

    /// Mark `sequence` as used under `label` without allocating it
    ///
    /// The counter only moves forward, so it stays past every sequence
    /// handed out under the label.
    pub fn reserve_sequence(&mut self, label: &str, sequence: u32) {
        let counter = self.index.entry(label.to_string()).or_insert(1);
        *counter = (*counter).max(sequence + 1);
    }

    /// Take the label's current counter and advance it
    pub fn allocate_sequence(&mut self, label: &str) -> u32 {
        let counter = self.index.entry(label.to_string()).or_insert(1);
        let sequence = *counter;
        *counter += 1;
        sequence
    }

    /// Record a placed asset. Entries are never reassigned.
    pub fn record(&mut self, fingerprint: String, file_name: String) {
        if self.hash.contains_key(&fingerprint) {
            warn!(%fingerprint, "Fingerprint already recorded, keeping original entry");
            return;
        }
        self.names.insert(file_name.clone());
        self.hash.insert(fingerprint, file_name);
    }

    /// Set a label counter directly (used when splitting aggregates)
    pub fn set_counter(&mut self, label: String, next: u32) {
        self.index.insert(label, next);
    }

    pub fn len(&self) -> usize {
        self.hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty() && self.index.is_empty()
    }
}

/// Outcome of reading a catalog document
#[derive(Debug)]
pub enum CatalogLoad {
    /// No document on disk
    Absent,
    Loaded(Catalog),
    /// A document exists but could not be read or parsed
    Corrupt { path: PathBuf, reason: String },
}

/// Reads and writes the catalogs of one album project
#[derive(Debug, Clone)]
pub struct CatalogStore {
    root: PathBuf,
}

impl CatalogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder of a year inside the project
    pub fn year_dir(&self, year: i32) -> PathBuf {
        self.root.join(format!("{:04}", year))
    }

    pub fn catalog_path(&self, year: i32) -> PathBuf {
        self.year_dir(year).join(CATALOG_FILENAME)
    }

    /// Location of a project-wide catalog awaiting a split
    pub fn aggregate_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILENAME)
    }

    /// Load the catalog of `year`
    pub fn load(&self, year: i32) -> CatalogLoad {
        Self::read(&self.catalog_path(year))
    }

    /// Read a catalog document from an explicit path
    pub fn read(path: &Path) -> CatalogLoad {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "Catalog does not exist");
                return CatalogLoad::Absent;
            }
            Err(e) => {
                return CatalogLoad::Corrupt {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                };
            }
        };

        match serde_json::from_str::<Catalog>(&content) {
            Ok(catalog) => {
                debug!(?path, entries = catalog.len(), "Loaded catalog");
                CatalogLoad::Loaded(catalog)
            }
            Err(e) => CatalogLoad::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        }
    }

    /// Persist the catalog of `year`, creating the year folder if needed
    pub fn save(&self, year: i32, catalog: &Catalog) -> Result<PathBuf> {
        let path = self.catalog_path(year);
        Self::write(&path, catalog)?;
        Ok(path)
    }

    /// Write a catalog document to an explicit path
    ///
    /// Keys come out sorted with four-space indentation, and the file is
    /// replaced through a temp file and rename.
    pub fn write(path: &Path, catalog: &Catalog) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
            catalog.serialize(&mut serializer)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        fs::rename(&temp_path, path)?;

        info!(catalog = %path.display(), entries = catalog.len(), "Catalog written");
        Ok(())
    }
}

/// Run-scoped catalog cache keyed by year
#[derive(Debug)]
pub struct CatalogRepository {
    store: CatalogStore,
    policy: CorruptCatalogPolicy,
    catalogs: BTreeMap<i32, Catalog>,
    dirty: BTreeSet<i32>,
}

impl CatalogRepository {
    pub fn new(store: CatalogStore, policy: CorruptCatalogPolicy) -> Self {
        Self {
            store,
            policy,
            catalogs: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Catalog for `year`, loading it on first access
    pub fn get(&mut self, year: i32) -> Result<&Catalog> {
        self.ensure_loaded(year)?;
        Ok(&self.catalogs[&year])
    }

    /// Mutable catalog for `year`; the year is written back by [`persist`](Self::persist)
    pub fn get_mut(&mut self, year: i32) -> Result<&mut Catalog> {
        self.ensure_loaded(year)?;
        self.dirty.insert(year);
        self.catalogs
            .get_mut(&year)
            .ok_or_else(|| Error::Config(format!("catalog for {} not cached", year)))
    }

    fn ensure_loaded(&mut self, year: i32) -> Result<()> {
        if self.catalogs.contains_key(&year) {
            return Ok(());
        }

        let catalog = match self.store.load(year) {
            CatalogLoad::Absent => Catalog::new(),
            CatalogLoad::Loaded(catalog) => catalog,
            CatalogLoad::Corrupt { path, reason } => match self.policy {
                CorruptCatalogPolicy::Fail => {
                    return Err(Error::CorruptCatalog {
                        path,
                        message: reason,
                    });
                }
                CorruptCatalogPolicy::Reset => {
                    warn!(
                        catalog = %path.display(),
                        %reason,
                        "Catalog unreadable, continuing with an empty one; its dedup history will be lost when it is written back"
                    );
                    Catalog::new()
                }
            },
        };

        self.catalogs.insert(year, catalog);
        Ok(())
    }

    /// Write every changed catalog once
    pub fn persist(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.dirty.len());
        for year in &self.dirty {
            if let Some(catalog) = self.catalogs.get(year) {
                written.push(self.store.save(*year, catalog)?);
            }
        }
        Ok(written)
    }
}
