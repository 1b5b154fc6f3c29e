//! Build pipeline hooks.
//!
//! [`DiwuPlugin::transform`] runs once per source module and
//! [`DiwuPlugin::on_finish`] once when the bundle is complete.

mod builder;

pub use builder::DiwuPluginBuilder;

use crate::artifact::ArtifactBuilder;
use crate::config::{DiwuConfig, PathsConfig};
use crate::error::Result;
use crate::hash::ContentHash;
use crate::manifest::Manifest;
use crate::publish::publish_scripts;
use crate::transform::{MarkerTransform, RemoteExport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of transforming one module.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    /// Client module replacing the original.
    pub code: String,
    pub hash: ContentHash,
    pub exports: Vec<RemoteExport>,
    /// Worker script registered in the manifest, when bundling succeeded.
    pub artifact: Option<PathBuf>,
}

/// The transform and completion hooks wired to one manifest.
#[derive(Debug)]
pub struct DiwuPlugin {
    config: DiwuConfig,
    transform: MarkerTransform,
    artifacts: ArtifactBuilder,
    manifest: Arc<Manifest>,
}

impl DiwuPlugin {
    /// Plugin with the JSON manifest and the configured bundler command.
    pub fn new(config: DiwuConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: DiwuConfig) -> DiwuPluginBuilder {
        DiwuPluginBuilder::new(config)
    }

    pub fn config(&self) -> &DiwuConfig {
        &self.config
    }

    /// Manifest shared with the dispatch front end.
    pub fn manifest(&self) -> Arc<Manifest> {
        Arc::clone(&self.manifest)
    }

    /// Transform hook. `None` leaves the module unchanged.
    pub fn transform(&self, source: &str, module_id: &str) -> Option<String> {
        match self.transform_module(source, module_id) {
            Ok(output) => output.map(|o| o.code),
            Err(e) => {
                warn!("[diwu]: leaving \"{}\" unchanged: {}", module_id, e);
                None
            }
        }
    }

    /// Transform hook with the full result.
    ///
    /// A failed bundle still yields the client module; the manifest keeps
    /// whatever it had for this module.
    pub fn transform_module(
        &self,
        source: &str,
        module_id: &str,
    ) -> Result<Option<TransformOutput>> {
        if module_id.contains(PathsConfig::SKIP_SEGMENT) {
            return Ok(None);
        }
        let module_path = module_id.split('?').next().unwrap_or(module_id);

        let Some(analysis) = self.transform.analyze(source, module_path)? else {
            return Ok(None);
        };
        let code = self.transform.render_client_module(&analysis);
        let artifact = self.build_artifact(module_path, &analysis.hash, &analysis.export_names());

        info!("[diwu]: \"{}\" transformed", module_id);
        Ok(Some(TransformOutput {
            code,
            hash: analysis.hash,
            exports: analysis.exports,
            artifact,
        }))
    }

    fn build_artifact(
        &self,
        module_path: &str,
        hash: &ContentHash,
        exports: &[String],
    ) -> Option<PathBuf> {
        let path = match self.artifacts.build(Path::new(module_path), hash, exports) {
            Ok(path) => path,
            Err(e) => {
                warn!("[diwu]: no worker script for \"{}\": {}", module_path, e);
                return None;
            }
        };

        match self.manifest.upsert(module_path, &path) {
            Ok(_) => Some(path),
            Err(e) => {
                warn!("[diwu]: failed to record \"{}\" in manifest: {}", module_path, e);
                None
            }
        }
    }

    /// Completion hook. Publishes worker scripts unless in watch mode.
    pub fn on_finish(&self, watch_mode: bool) -> Result<usize> {
        if watch_mode {
            debug!("Watch mode, not publishing worker scripts");
            return Ok(0);
        }
        self.publish()
    }

    /// Copy worker scripts into `{out_dir}/scripts`.
    pub fn publish(&self) -> Result<usize> {
        publish_scripts(&self.config.scripts_dir(), &self.config.publish_dir())
    }
}
