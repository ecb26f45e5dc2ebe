//! Catalog split and cross-project import planning

use crate::catalog::{Catalog, CatalogLoad, CatalogRepository, CatalogStore};
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static YEAR_DIR_PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

fn year_dir_pattern() -> Result<&'static Regex> {
    YEAR_DIR_PATTERN
        .get_or_init(|| Regex::new(r"^\d{4}$"))
        .as_ref()
        .map_err(|e| Error::Pattern(e.clone()))
}

/// Year prefix of a label or file name
fn year_prefix(name: &str) -> &str {
    name.get(..4).unwrap_or(name)
}

/// Partition an aggregate catalog by the year embedded in labels and file names
///
/// Fails if the hash index and the sequence index disagree on the set of years.
pub fn partition_catalog(aggregate: &Catalog) -> Result<BTreeMap<String, Catalog>> {
    let mut hash_groups: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for (fingerprint, name) in aggregate.hashes() {
        hash_groups
            .entry(year_prefix(name).to_string())
            .or_default()
            .insert(fingerprint.clone(), name.clone());
    }

    let mut index_groups: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
    for (label, next) in aggregate.index() {
        index_groups
            .entry(year_prefix(label).to_string())
            .or_default()
            .insert(label.clone(), *next);
    }

    let hash_years: BTreeSet<&String> = hash_groups.keys().collect();
    let index_years: BTreeSet<&String> = index_groups.keys().collect();
    if hash_years != index_years {
        return Err(Error::YearSetMismatch {
            hash_years: hash_years.into_iter().cloned().collect(),
            index_years: index_years.into_iter().cloned().collect(),
        });
    }

    Ok(index_groups
        .into_iter()
        .map(|(year, index)| {
            let hash = hash_groups.remove(&year).unwrap_or_default();
            (year, Catalog::from_parts(index, hash))
        })
        .collect())
}

/// Split `<project>/database.json` into one catalog per year folder
///
/// Every year folder must already exist; nothing is written unless all do.
pub fn split_catalog(project_root: &Path) -> Result<Vec<PathBuf>> {
    let store = CatalogStore::new(project_root);
    let aggregate_path = store.aggregate_path();

    let aggregate = match CatalogStore::read(&aggregate_path) {
        CatalogLoad::Loaded(catalog) => catalog,
        CatalogLoad::Absent => {
            return Err(Error::Config(format!(
                "no aggregate catalog at {}",
                aggregate_path.display()
            )));
        }
        CatalogLoad::Corrupt { path, reason } => {
            return Err(Error::CorruptCatalog {
                path,
                message: reason,
            });
        }
    };

    if aggregate.index().is_empty() || aggregate.hashes().is_empty() {
        return Err(Error::Config(format!(
            "aggregate catalog {} lacks an index or hash section",
            aggregate_path.display()
        )));
    }

    let parts = partition_catalog(&aggregate)?;

    for year in parts.keys() {
        let year_dir = project_root.join(year);
        if !year_dir.is_dir() {
            return Err(Error::MissingYearDirectory { path: year_dir });
        }
    }

    let mut written = Vec::with_capacity(parts.len());
    for (year, catalog) in &parts {
        let path = project_root.join(year).join(crate::catalog::CATALOG_FILENAME);
        CatalogStore::write(&path, catalog)?;
        written.push(path);
    }

    info!(years = written.len(), "Split aggregate catalog");
    Ok(written)
}

/// Files one project has that another lacks
#[derive(Debug, Default)]
pub struct ProjectImportPlan {
    /// Files whose fingerprints the destination does not know
    pub queued: Vec<PathBuf>,
    /// Files the destination already has
    pub present: Vec<PathBuf>,
    /// Catalog entries with no file on disk
    pub missing: Vec<PathBuf>,
}

/// Year folders (`YYYY`) of a project, ascending
pub fn year_directories(project_root: &Path) -> Result<Vec<(i32, PathBuf)>> {
    let pattern = year_dir_pattern()?;
    let mut years = Vec::new();
    for entry in fs::read_dir(project_root)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !pattern.is_match(name) || !entry.file_type()?.is_dir() {
            continue;
        }
        if let Ok(year) = name.parse::<i32>() {
            years.push((year, entry.path()));
        }
    }
    years.sort();
    Ok(years)
}

/// Compare `source_root` against the destination catalogs by fingerprint
pub fn plan_project_import(
    source_root: &Path,
    destination: &mut CatalogRepository,
) -> Result<ProjectImportPlan> {
    let source = CatalogStore::new(source_root);
    let mut plan = ProjectImportPlan::default();

    for (year, year_dir) in year_directories(source_root)? {
        let catalog = match source.load(year) {
            CatalogLoad::Loaded(catalog) => catalog,
            CatalogLoad::Absent => {
                warn!(year_dir = %year_dir.display(), "Year folder has no catalog, skipping");
                continue;
            }
            CatalogLoad::Corrupt { path, reason } => {
                return Err(Error::CorruptCatalog {
                    path,
                    message: reason,
                });
            }
        };

        let known = destination.get(year)?;
        let mut locator = FileLocator::new(&year_dir);

        for (fingerprint, name) in catalog.hashes() {
            let Some(path) = locator.locate(name) else {
                warn!(year, file = %name, "Catalog entry has no file on disk");
                plan.missing.push(year_dir.join(name));
                continue;
            };

            if known.contains_fingerprint(fingerprint) {
                info!(path = %path.display(), "Already present");
                plan.present.push(path);
            } else {
                debug!(path = %path.display(), "Queued for import");
                plan.queued.push(path);
            }
        }
    }

    info!(
        queued = plan.queued.len(),
        present = plan.present.len(),
        missing = plan.missing.len(),
        "Planned project import"
    );
    Ok(plan)
}

/// Finds album files directly in a year folder or one date folder below it
struct FileLocator<'a> {
    year_dir: &'a Path,
    nested: Option<HashMap<OsString, PathBuf>>,
}

impl<'a> FileLocator<'a> {
    fn new(year_dir: &'a Path) -> Self {
        Self {
            year_dir,
            nested: None,
        }
    }

    fn locate(&mut self, name: &str) -> Option<PathBuf> {
        let direct = self.year_dir.join(name);
        if direct.is_file() {
            return Some(direct);
        }

        let year_dir = self.year_dir;
        let nested = self.nested.get_or_insert_with(|| {
            WalkDir::new(year_dir)
                .min_depth(2)
                .max_depth(2)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| (e.file_name().to_os_string(), e.into_path()))
                .collect()
        });
        nested.get(&OsString::from(name)).cloned()
    }
}
