use super::bundler::Bundler;
use super::epilogue::render_epilogue;
use crate::error::Result;
use crate::hash::ContentHash;
use crate::manifest::atomic::atomic_write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes `{hash}.js` worker scripts into the scripts directory.
pub struct ArtifactBuilder {
    scripts_dir: PathBuf,
    bundler: Box<dyn Bundler>,
}

impl ArtifactBuilder {
    pub fn new(scripts_dir: impl Into<PathBuf>, bundler: impl Bundler + 'static) -> Self {
        Self::from_boxed(scripts_dir, Box::new(bundler))
    }

    pub fn from_boxed(scripts_dir: impl Into<PathBuf>, bundler: Box<dyn Bundler>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            bundler,
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Where the script for `hash` lives.
    pub fn artifact_path(&self, hash: &ContentHash) -> PathBuf {
        self.scripts_dir.join(hash.script_file_name())
    }

    /// Bundle `module_path` and append the epilogue for `exports`.
    ///
    /// The file is complete on disk before this returns.
    pub fn build(
        &self,
        module_path: &Path,
        hash: &ContentHash,
        exports: &[String],
    ) -> Result<PathBuf> {
        let bundled = self.bundler.bundle(module_path)?;

        let mut script = bundled;
        if !script.ends_with('\n') {
            script.push('\n');
        }
        script.push_str(&render_epilogue(exports));

        let path = self.artifact_path(hash);
        atomic_write(&path, script.as_bytes())?;
        debug!("Wrote worker script {} for {}", path.display(), module_path.display());
        Ok(path)
    }
}

impl std::fmt::Debug for ArtifactBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBuilder")
            .field("scripts_dir", &self.scripts_dir)
            .finish_non_exhaustive()
    }
}
