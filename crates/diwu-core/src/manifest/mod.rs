//! Module → artifact manifest.
//!
//! One entry per module id. Re-transforming a module whose source changed
//! produces a new artifact path; the previous artifact is removed only after the
//! new file exists and the mapping pointing at it has been persisted.

pub mod atomic;
pub mod store;

pub use store::{JsonFileStore, ManifestMap, ManifestStore, MemoryStore};

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Shared handle over a [`ManifestStore`].
pub struct Manifest {
    store: Box<dyn ManifestStore>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest").finish_non_exhaustive()
    }
}

impl Manifest {
    pub fn new(store: impl ManifestStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            write_lock: Mutex::new(()),
        }
    }

    /// Manifest persisted as JSON at `path`.
    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileStore::new(path))
    }

    /// Manifest kept in memory.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Point `module_id` at `artifact`.
    ///
    /// Returns the previous artifact path when it differed.
    /// A missing or corrupt manifest is treated as empty. Failing to remove the
    /// stale artifact is logged and does not fail the upsert.
    pub fn upsert(&self, module_id: &str, artifact: &Path) -> Result<Option<PathBuf>> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries = self.load_or_empty();
        let artifact = artifact.to_string_lossy().into_owned();
        let previous = entries.insert(module_id.to_string(), artifact.clone());
        self.store.save(&entries)?;

        let Some(previous) = previous.filter(|p| *p != artifact) else {
            return Ok(None);
        };

        let previous = PathBuf::from(previous);
        match std::fs::remove_file(&previous) {
            Ok(()) => debug!("Removed stale artifact {}", previous.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove stale artifact {}: {}", previous.display(), e),
        }
        Ok(Some(previous))
    }

    /// Artifact path recorded for `module_id`.
    pub fn get(&self, module_id: &str) -> Option<PathBuf> {
        self.load_or_empty().get(module_id).map(PathBuf::from)
    }

    /// Artifact whose file stem equals `hash`.
    pub fn resolve_hash(&self, hash: &str) -> Option<PathBuf> {
        self.load_or_empty()
            .into_values()
            .map(PathBuf::from)
            .find(|path| path.file_stem().is_some_and(|stem| stem == hash))
    }

    /// Snapshot of every entry.
    pub fn entries(&self) -> ManifestMap {
        self.load_or_empty()
    }

    fn load_or_empty(&self) -> ManifestMap {
        match self.store.load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring unreadable manifest: {}", e);
                ManifestMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upsert_last_writer_wins_and_removes_stale_file() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = Manifest::json_file(temp_dir.path().join("manifest.json"));
        let a = temp_dir.path().join("aaa.js");
        let b = temp_dir.path().join("bbb.js");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();

        assert_eq!(manifest.upsert("/src/m.ts", &a).unwrap(), None);
        assert_eq!(manifest.upsert("/src/m.ts", &b).unwrap(), Some(a.clone()));

        assert!(!a.exists());
        assert!(b.exists());
        assert_eq!(manifest.get("/src/m.ts"), Some(b));
    }

    #[test]
    fn test_failed_stale_removal_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = Manifest::json_file(temp_dir.path().join("manifest.json"));
        let stale = temp_dir.path().join("aaa.js");
        std::fs::create_dir(&stale).unwrap();
        std::fs::write(stale.join("keep"), "x").unwrap();
        let fresh = temp_dir.path().join("bbb.js");
        std::fs::write(&fresh, "b").unwrap();

        manifest.upsert("/src/m.ts", &stale).unwrap();
        assert_eq!(
            manifest.upsert("/src/m.ts", &fresh).unwrap(),
            Some(stale.clone())
        );

        assert!(stale.is_dir());
        assert_eq!(manifest.get("/src/m.ts"), Some(fresh));
    }

    #[test]
    fn test_upsert_same_path_keeps_file() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = Manifest::in_memory();
        let a = temp_dir.path().join("aaa.js");
        std::fs::write(&a, "a").unwrap();

        manifest.upsert("m", &a).unwrap();
        assert_eq!(manifest.upsert("m", &a).unwrap(), None);
        assert!(a.exists());
    }

    #[test]
    fn test_corrupt_manifest_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.json");
        std::fs::write(&path, "][").unwrap();

        let manifest = Manifest::json_file(&path);
        assert!(manifest.entries().is_empty());

        manifest.upsert("m", Path::new("/cache/abc.js")).unwrap();
        assert_eq!(manifest.entries().len(), 1);
    }

    #[test]
    fn test_resolve_hash_by_file_stem() {
        let manifest = Manifest::in_memory();
        manifest.upsert("one", Path::new("/cache/scripts/abc123.js")).unwrap();
        manifest.upsert("two", Path::new("/cache/scripts/def456.js")).unwrap();

        assert_eq!(
            manifest.resolve_hash("def456"),
            Some(PathBuf::from("/cache/scripts/def456.js"))
        );
        assert_eq!(manifest.resolve_hash("abc"), None);
    }
}
