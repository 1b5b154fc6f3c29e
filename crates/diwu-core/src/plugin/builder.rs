//! Builder for configuring DiwuPlugin initialization.

use super::DiwuPlugin;
use crate::artifact::{ArtifactBuilder, Bundler, CommandBundler};
use crate::config::DiwuConfig;
use crate::error::{IoResultExt, Result};
use crate::manifest::Manifest;
use crate::transform::{MarkerSet, MarkerTransform};
use std::sync::Arc;
use tracing::debug;

/// Builder for [`DiwuPlugin`].
///
/// # Example
///
/// ```rust,ignore
/// use diwu_core::{DiwuConfig, DiwuPlugin, InlineBundler};
///
/// let plugin = DiwuPlugin::builder(DiwuConfig::resolve(".")?)
///     .bundler(InlineBundler::default())
///     .auto_create_dirs(true)
///     .build()?;
/// ```
pub struct DiwuPluginBuilder {
    config: DiwuConfig,
    manifest: Option<Arc<Manifest>>,
    bundler: Option<Box<dyn Bundler>>,
    auto_create_dirs: bool,
}

impl DiwuPluginBuilder {
    pub fn new(config: DiwuConfig) -> Self {
        Self {
            config,
            manifest: None,
            bundler: None,
            auto_create_dirs: false,
        }
    }

    /// Share an existing manifest instead of the JSON file under the cache dir.
    pub fn manifest(mut self, manifest: Arc<Manifest>) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Replace the configured external bundler command.
    pub fn bundler(mut self, bundler: impl Bundler + 'static) -> Self {
        self.bundler = Some(Box::new(bundler));
        self
    }

    /// Create the scripts directory up front.
    ///
    /// Default: `false` (created on first artifact write)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    pub fn build(self) -> Result<DiwuPlugin> {
        let config = self.config;

        let scripts_dir = config.scripts_dir();
        if self.auto_create_dirs {
            std::fs::create_dir_all(&scripts_dir).with_path("creating directory", &scripts_dir)?;
        }

        let manifest = self
            .manifest
            .unwrap_or_else(|| Arc::new(Manifest::json_file(config.manifest_path())));
        let bundler = self.bundler.unwrap_or_else(|| {
            Box::new(CommandBundler::new(config.bundler_command.clone(), config.root.clone()))
        });

        debug!("Building diwu plugin for {}", config.root.display());
        Ok(DiwuPlugin {
            transform: MarkerTransform::new(MarkerSet::from_config(&config)),
            artifacts: ArtifactBuilder::from_boxed(scripts_dir, bundler),
            manifest,
            config,
        })
    }
}
