//! Denylist file discovery.
//!
//! `.deny` files are picked up from the configured directories (by default
//! the user config dir and `/etc/ipfs/denylists`), lexically sorted within
//! each directory, first directory's files first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use gatefs_types::config::BlockerConfig;
use gatefs_types::error::Result;

/// All `.deny` files in the configured directories, in load order.
pub fn denylist_files(config: &BlockerConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for dir in &config.denylist_dirs {
        files.extend(denylist_files_in(dir)?);
    }
    Ok(files)
}

/// The `.deny` files directly inside `dir`, lexically sorted. A missing
/// directory yields an empty list rather than an error.
pub fn denylist_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "denylist directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "deny") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
