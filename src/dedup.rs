//! Dedup & ordering engine
//!
//! Turns candidate paths into the list of assets worth placing:
//! 1. Read capture times and fingerprints (fanned out over rayon)
//! 2. Drop assets whose fingerprint is already in the year's catalog or was
//!    accepted earlier in the same batch
//! 3. Sort survivors by `(capture time, fingerprint)`
//!
//! Nothing here touches the filesystem beyond reads.

use crate::catalog::CatalogRepository;
use crate::error::Result;
use crate::fingerprint::compute_fingerprint;
use crate::time::CaptureTime;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A candidate file with everything the engines need to know about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub captured: CaptureTime,
    pub fingerprint: String,
}

impl Asset {
    /// Read the capture time and fingerprint of `path`
    pub fn inspect(path: &Path, sample_size: usize) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            captured: CaptureTime::read(path)?,
            fingerprint: compute_fingerprint(path, sample_size)?,
        })
    }

    /// Catalog year the asset belongs to
    pub fn year(&self) -> i32 {
        self.captured.year()
    }

    /// Extension as found on disk, without the dot
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
    }

    /// Path without its extension; assets sharing it form a companion group
    pub fn companion_key(&self) -> PathBuf {
        self.path.with_extension("")
    }
}

/// Where an already known fingerprint was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateOf {
    /// Recorded in the year's catalog under this file name
    Catalog(String),
    /// Accepted earlier in this batch from this path
    Batch(PathBuf),
}

/// An asset dropped as a duplicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub path: PathBuf,
    pub fingerprint: String,
    pub existing: DuplicateOf,
}

/// Result of filtering a batch
#[derive(Debug, Default)]
pub struct Survey {
    /// Assets to place, in placement order
    pub accepted: Vec<Asset>,
    pub duplicates: Vec<Duplicate>,
}

/// Inspect every path, keeping input order
pub fn inspect_assets(paths: &[PathBuf], sample_size: usize) -> Result<Vec<Asset>> {
    paths
        .par_iter()
        .map(|path| Asset::inspect(path, sample_size))
        .collect()
}

/// Drop duplicates against the catalogs and earlier assets of the batch
///
/// The first asset of a batch with a given fingerprint wins.
pub fn select_survivors(assets: Vec<Asset>, catalogs: &mut CatalogRepository) -> Result<Survey> {
    let mut survey = Survey::default();
    let mut accepted: HashMap<String, PathBuf> = HashMap::new();

    for asset in assets {
        let known = catalogs
            .get(asset.year())?
            .lookup(&asset.fingerprint)
            .map(|name| DuplicateOf::Catalog(name.to_string()));
        let existing = known.or_else(|| {
            accepted
                .get(&asset.fingerprint)
                .map(|p| DuplicateOf::Batch(p.clone()))
        });

        if let Some(existing) = existing {
            info!(
                fingerprint = %asset.fingerprint,
                path = %asset.path.display(),
                ?existing,
                "[DUP] Skipping duplicate"
            );
            survey.duplicates.push(Duplicate {
                path: asset.path,
                fingerprint: asset.fingerprint,
                existing,
            });
            continue;
        }

        accepted.insert(asset.fingerprint.clone(), asset.path.clone());
        survey.accepted.push(asset);
    }

    order_assets(&mut survey.accepted);
    debug!(
        accepted = survey.accepted.len(),
        duplicates = survey.duplicates.len(),
        "Selected survivors"
    );
    Ok(survey)
}

/// Sort ascending by capture time, fingerprint breaking ties
pub fn order_assets(assets: &mut [Asset]) {
    assets.sort_by(|a, b| {
        (a.captured, &a.fingerprint).cmp(&(b.captured, &b.fingerprint))
    });
}

/// Inspect, filter and order a batch of candidate paths
pub fn survey(
    paths: &[PathBuf],
    sample_size: usize,
    catalogs: &mut CatalogRepository,
) -> Result<Survey> {
    if paths.is_empty() {
        warn!("No candidate assets");
        return Ok(Survey::default());
    }

    info!(count = paths.len(), "Computing fingerprints...");
    let assets = inspect_assets(paths, sample_size)?;
    select_survivors(assets, catalogs)
}
