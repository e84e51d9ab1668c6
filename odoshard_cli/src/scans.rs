// odoshard_cli/src/scans.rs

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::CliError;

fn is_scan_file(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext == "yaml" || ext == "yml")
}

/// Every `.yaml`/`.yml` file under `dir`, sorted by path so the order matches
/// zero-padded frame numbering.
pub fn collect_scan_dir(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut scans = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|source| CliError::ScanDir {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && is_scan_file(entry.path()) {
            scans.push(entry.into_path());
        }
    }
    scans.sort();
    Ok(scans)
}
