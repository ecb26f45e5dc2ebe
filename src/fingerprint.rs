//! Partial-content fingerprints for deduplication
//!
//! Only the first `sample_size` bytes of a file are hashed, so two distinct
//! files sharing identical leading bytes are reported as duplicates.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;
use xxhash_rust::xxh3::xxh3_128;

/// Compute the fingerprint of a file as 32 lowercase hex digits
pub fn compute_fingerprint(path: &Path, sample_size: usize) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::Fingerprint {
        path: path.to_path_buf(),
        message: format!("Failed to open file: {}", e),
    })?;

    let file_len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let capacity = usize::try_from(file_len).unwrap_or(usize::MAX).min(sample_size);

    let mut buffer = Vec::with_capacity(capacity);
    file.take(u64::try_from(sample_size).unwrap_or(u64::MAX))
        .read_to_end(&mut buffer)
        .map_err(|e| Error::Fingerprint {
            path: path.to_path_buf(),
            message: format!("Failed to read file head: {}", e),
        })?;

    let fingerprint = format!("{:032x}", xxh3_128(&buffer));
    trace!(?path, sampled = buffer.len(), %fingerprint, "Computed fingerprint");
    Ok(fingerprint)
}
