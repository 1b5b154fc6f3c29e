//! Atomic file writes.
//!
//! Writers go through a temp file in the target's directory, fsync it, then
//! rename it over the target, so readers only ever see a complete old file or
//! a complete new one.

use crate::error::{DiwuError, IoResultExt, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_path("reading", path)?;
    let data = serde_json::from_str(&contents).map_err(|e| DiwuError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Serialize `data` as pretty JSON and write it atomically.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(data).map_err(|e| DiwuError::Json {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;
    atomic_write(path, serialized.as_bytes())
}

/// Write `contents` to `path` atomically, creating parent directories.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_path("creating directory", parent)?;

    let mut temp = NamedTempFile::new_in(parent).with_path("creating temp file in", parent)?;
    temp.write_all(contents).with_path("writing", temp.path().to_path_buf())?;
    temp.as_file().sync_all().with_path("syncing", temp.path().to_path_buf())?;

    temp.persist(path)
        .map_err(|e| DiwuError::io("renaming temp file to", path, e.error))?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}
