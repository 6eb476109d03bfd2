// CSV import: read → normalize → upsert, with provenance
//
// The source file's SHA-256 travels with every audit event of the batch, so
// a stored change can be traced back to the exact file that produced it.

use crate::db::{BatchOrigin, BatchSummary, Store};
use crate::error::Result;
use crate::parser::{normalize_all, read_csv};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of one file import
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub source: PathBuf,
    pub sha256: String,
    pub rows: usize,
    pub summary: BatchSummary,
}

/// Hex SHA-256 of a file's bytes
pub fn file_sha256(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Import an inventory CSV into `store` as one atomic batch.
///
/// Nothing is written unless every row normalizes.
pub fn import_csv(store: &mut Store, csv_path: &Path, actor: &str) -> Result<ImportReport> {
    let sha256 = file_sha256(csv_path)?;
    let rows = read_csv(csv_path)?;
    let records = normalize_all(&rows)?;

    let origin = BatchOrigin::new(actor).with_source_sha256(sha256.clone());
    let summary = store.apply_batch_from(&records, &origin)?;

    info!(
        source = %csv_path.display(),
        sha256 = %sha256,
        rows = rows.len(),
        "import finished"
    );

    Ok(ImportReport {
        source: csv_path.to_path_buf(),
        sha256,
        rows: rows.len(),
        summary,
    })
}
