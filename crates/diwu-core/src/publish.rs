//! Copy generated worker scripts into the distribution output.

use crate::error::{DiwuError, IoResultExt, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Copy every file under `from` into `to`, keeping relative paths.
///
/// A missing `from` directory publishes nothing. Returns the number of files
/// copied.
pub fn publish_scripts(from: &Path, to: &Path) -> Result<usize> {
    if !from.is_dir() {
        debug!("No worker scripts to publish at {}", from.display());
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(|e| DiwuError::Io {
            message: format!("Failed to walk {}: {}", from.display(), e),
            path: e.path().map(Path::to_path_buf),
            source: e.into_io_error(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_path("creating directory", parent)?;
        }
        fs::copy(entry.path(), &target).with_path("copying to", &target)?;
        copied += 1;
    }

    info!("Published {} worker script(s) to {}", copied, to.display());
    Ok(copied)
}
