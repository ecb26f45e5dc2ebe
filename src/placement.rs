//! Sequencer & placement engine
//!
//! Walks the ordered survivors and, for each asset:
//! - allocates (or shares, for companion files) a sequence number under its
//!   `YYYYMM` label
//! - names it `YYYYMM_NNNN.<ext>` inside `<project>/<YYYY>[/<YYYY-MM-DD>]`
//! - copies or moves it there and records the name in the year's catalog
//!
//! Any collision with an existing file or catalog entry aborts the run.

use crate::catalog::CatalogRepository;
use crate::config::FileOperation;
use crate::dedup::Asset;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Sequence shared by a companion group and how many members took it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionState {
    /// Label the sequence was allocated under
    pub label: String,
    pub sequence: u32,
    pub members: u32,
}

/// How the next member of a companion group gets its sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionDecision {
    /// Take a fresh sequence from the label counter
    Allocate,
    /// Share the group's sequence
    Reuse(u32),
}

/// Companion grouping rule
///
/// Only the second member of a group shares the first member's sequence.
/// A third member starts a new group with a fresh sequence, which a fourth
/// member would then share.
// TODO: confirm whether groups larger than a photo+video pair (e.g. RAW+JPG+MOV)
// should all share one sequence before changing this.
pub fn companion_policy(prior: Option<&CompanionState>) -> CompanionDecision {
    match prior {
        Some(state) if state.members == 1 => CompanionDecision::Reuse(state.sequence),
        _ => CompanionDecision::Allocate,
    }
}

/// Album file name for a sequence, keeping the extension's case
pub fn destination_name(label: &str, sequence: u32, extension: &str) -> String {
    if extension.is_empty() {
        format!("{}_{:04}", label, sequence)
    } else {
        format!("{}_{:04}.{}", label, sequence, extension)
    }
}

/// How assets land in the album
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementOptions {
    pub operation: FileOperation,
    /// Group assets into `YYYY-MM-DD` folders under the year
    pub date_folders: bool,
    /// Compute names without touching the filesystem
    pub dry_run: bool,
}

/// Where an asset went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub file_name: String,
    pub fingerprint: String,
    pub label: String,
    pub sequence: u32,
}

/// Places assets for one run, remembering companion groups along the way
#[derive(Debug)]
pub struct Placer {
    options: PlacementOptions,
    companions: HashMap<PathBuf, CompanionState>,
}

impl Placer {
    pub fn new(options: PlacementOptions) -> Self {
        Self {
            options,
            companions: HashMap::new(),
        }
    }

    /// Place every asset in order, stopping at the first failure
    pub fn place_all(
        &mut self,
        assets: &[Asset],
        catalogs: &mut CatalogRepository,
    ) -> Result<Vec<Placement>> {
        assets
            .iter()
            .map(|asset| self.place(asset, catalogs))
            .collect()
    }

    /// Place one asset and record it in its year's catalog
    pub fn place(&mut self, asset: &Asset, catalogs: &mut CatalogRepository) -> Result<Placement> {
        let year = asset.year();
        let label = asset.captured.label();
        let key = asset.companion_key();

        let mut directory = catalogs.store().year_dir(year);
        if self.options.date_folders {
            directory.push(asset.captured.date_folder());
        }

        let catalog = catalogs.get_mut(year)?;
        let prior = self.companions.get(&key);
        let decision = match companion_policy(prior) {
            // A member in another month may share the number only while that
            // label has not handed it out yet.
            CompanionDecision::Reuse(sequence)
                if prior.is_some_and(|p| p.label != label)
                    && catalog.next_sequence(&label) > sequence =>
            {
                debug!(
                    path = %asset.path.display(),
                    %label,
                    sequence,
                    "Companion sequence already used in label, allocating"
                );
                CompanionDecision::Allocate
            }
            decision => decision,
        };
        let members = prior.map_or(0, |p| p.members);

        let sequence = match decision {
            CompanionDecision::Allocate => {
                let sequence = catalog.allocate_sequence(&label);
                self.companions.insert(
                    key,
                    CompanionState {
                        label: label.clone(),
                        sequence,
                        members: 1,
                    },
                );
                sequence
            }
            CompanionDecision::Reuse(sequence) => {
                catalog.reserve_sequence(&label, sequence);
                if let Some(state) = self.companions.get_mut(&key) {
                    state.members = members + 1;
                }
                sequence
            }
        };

        let file_name = destination_name(&label, sequence, asset.extension());
        if catalog.is_name_assigned(&file_name) {
            return Err(Error::SequenceReuse {
                source_path: asset.path.clone(),
                file_name,
                year,
            });
        }

        let destination = directory.join(&file_name);
        if destination.exists() {
            return Err(Error::DestinationExists {
                source_path: asset.path.clone(),
                destination,
            });
        }

        if self.options.dry_run {
            debug!(source = %asset.path.display(), destination = %destination.display(), "Would place asset");
        } else {
            fs::create_dir_all(&directory)?;
            perform_file_operation(&asset.path, &destination, self.options.operation)?;
        }

        catalog.record(asset.fingerprint.clone(), file_name.clone());
        info!(
            "{} {} => {}",
            asset.fingerprint,
            asset.path.display(),
            destination.display()
        );

        Ok(Placement {
            source: asset.path.clone(),
            destination,
            file_name,
            fingerprint: asset.fingerprint.clone(),
            label,
            sequence,
        })
    }
}

/// Copy or move `source` to `dest`, which must not exist yet
fn perform_file_operation(source: &Path, dest: &Path, operation: FileOperation) -> Result<()> {
    match operation {
        FileOperation::Copy => {
            copy_file(source, dest)?;
        }
        FileOperation::Move => {
            // Try rename first (faster for same filesystem)
            if fs::rename(source, dest).is_err() {
                // Fall back to copy + delete for cross-filesystem moves
                copy_file(source, dest)?;
                fs::remove_file(source)?;
            }
        }
    }

    Ok(())
}

/// Copy file with buffered I/O, refusing to overwrite
///
/// The modification time is carried over since it decides the asset's year
/// and month on later rebuilds.
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let src_file = File::open(source)?;
    let mtime = src_file.metadata()?.modified()?;
    let dest_file = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let mut reader = BufReader::with_capacity(256 * 1024, src_file);
    let mut writer = BufWriter::with_capacity(256 * 1024, dest_file);

    let mut buffer = vec![0u8; 256 * 1024];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
    }

    writer.flush()?;
    drop(writer);

    filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime))?;
    Ok(())
}
