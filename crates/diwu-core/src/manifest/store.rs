//! Backing stores for the manifest mapping.

use super::atomic::{atomic_read_json, atomic_write_json};
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Module id → artifact path, as persisted.
pub type ManifestMap = BTreeMap<String, String>;

/// Where the manifest mapping lives.
pub trait ManifestStore: Send + Sync {
    /// Load the whole mapping. A store that has never been written is empty.
    fn load(&self) -> Result<ManifestMap>;

    /// Replace the whole mapping.
    fn save(&self, entries: &ManifestMap) -> Result<()>;
}

/// JSON object on disk, written atomically.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestStore for JsonFileStore {
    fn load(&self) -> Result<ManifestMap> {
        Ok(atomic_read_json(&self.path)?.unwrap_or_default())
    }

    fn save(&self, entries: &ManifestMap) -> Result<()> {
        atomic_write_json(&self.path, entries)
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<ManifestMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ManifestStore for MemoryStore {
    fn load(&self) -> Result<ManifestMap> {
        Ok(self.entries.lock().map(|e| e.clone()).unwrap_or_default())
    }

    fn save(&self, entries: &ManifestMap) -> Result<()> {
        if let Ok(mut current) = self.entries.lock() {
            *current = entries.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_store_created_lazily() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join(".diwu").join("manifest.json"));
        assert!(store.load().unwrap().is_empty());
        assert!(!store.path().exists());

        let mut entries = ManifestMap::new();
        entries.insert("/src/a.ts".into(), "/cache/scripts/abc.js".into());
        store.save(&entries).unwrap();

        assert_eq!(store.load().unwrap(), entries);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"/src/a.ts\": \"/cache/scripts/abc.js\""));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        let mut entries = ManifestMap::new();
        entries.insert("a".into(), "b".into());
        store.save(&entries).unwrap();
        assert_eq!(store.load().unwrap(), entries);
    }
}
