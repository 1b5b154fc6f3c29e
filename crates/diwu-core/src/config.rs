//! Centralized configuration for diwu.
//!
//! Fixed values live in the `*Config` unit structs below. Everything a project
//! may want to change is carried by [`DiwuConfig`], which is resolved from
//! built-in defaults, the `diwu` object in `package.json`, the
//! `npm_package_diwu_*` environment variables npm exports for that object, and
//! finally explicit overrides (CLI flags).

use crate::error::{DiwuError, IoResultExt, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Shared directory and path configurations.
pub struct PathsConfig;

impl PathsConfig {
    pub const CACHE_DIR: &'static str = "node_modules/.diwu";
    pub const SCRIPTS_DIR_NAME: &'static str = "scripts";
    pub const MANIFEST_FILENAME: &'static str = "manifest.json";
    pub const OUT_DIR: &'static str = "dist";
    pub const PACKAGE_JSON: &'static str = "package.json";
    pub const SCRIPT_EXTENSION: &'static str = "js";
    /// Module ids containing this segment are never transformed.
    pub const SKIP_SEGMENT: &'static str = "node_modules";
}

/// Dispatch front end and worker process settings.
pub struct DispatchConfig;

impl DispatchConfig {
    pub const BASE_PATH: &'static str = "/diwu";
    pub const RUNTIME: &'static str = "node";
    pub const WORKER_TIMEOUT: Duration = Duration::from_secs(30);
    /// How long to keep draining stdout after the worker has exited.
    pub const REPLY_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
    /// Reply returned when a worker exits without sending anything.
    pub const DEFAULT_ERROR: &'static str = "script error";
    pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
}

/// Content hash settings.
pub struct HashConfig;

impl HashConfig {
    /// Static HMAC key. Changing it renames every artifact.
    pub const KEY: &'static [u8] = b"$diwu";
    /// Hex length of a content hash.
    pub const HEX_LEN: usize = 64;
}

/// Marker package defaults.
pub struct MarkerConfig;

impl MarkerConfig {
    pub const PACKAGE: &'static str = "diwu";
    pub const KINDS: [&'static str; 2] = ["diwuFn", "diwuHook"];
    /// Prefix of the client-side stub factory for a marker kind.
    pub const STUB_PREFIX: &'static str = "$";
}

/// Default external bundler invocation. `{entry}` is replaced by the module path.
pub const DEFAULT_BUNDLER_COMMAND: [&str; 9] = [
    "npx",
    "--no-install",
    "esbuild",
    "{entry}",
    "--bundle",
    "--platform=node",
    "--format=cjs",
    "--log-level=error",
    "--target=node16",
];

/// Resolved project configuration.
#[derive(Debug, Clone)]
pub struct DiwuConfig {
    /// Project root; relative paths resolve against it.
    pub root: PathBuf,
    /// Distribution output directory.
    pub out_dir: PathBuf,
    /// Build cache holding the manifest and worker scripts.
    pub cache_dir: PathBuf,
    /// Package the marker factories are imported from.
    pub marker_package: String,
    /// Imported names recognized as remote-capable factories.
    pub marker_kinds: Vec<String>,
    /// Route prefix served by the dispatch front end.
    pub base_path: String,
    /// Program used to execute worker scripts.
    pub runtime: String,
    /// Deadline for a single worker call.
    pub worker_timeout: Duration,
    /// External bundler command line.
    pub bundler_command: Vec<String>,
}

/// Partial configuration, as found in `package.json`, the environment or CLI.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverrides {
    pub out_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub marker_package: Option<String>,
    pub marker_kinds: Option<Vec<String>>,
    pub base_path: Option<String>,
    pub runtime: Option<String>,
    pub timeout_secs: Option<u64>,
    pub bundler: Option<Vec<String>>,
}

impl ConfigOverrides {
    /// Read overrides from `npm_package_diwu_*` style variables.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(&format!("npm_package_diwu_{}", key)).filter(|v| !v.is_empty())
        };

        let timeout_secs = match get("timeoutSecs") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|e| DiwuError::Config {
                message: format!("Invalid npm_package_diwu_timeoutSecs {:?}: {}", raw, e),
            })?),
            None => None,
        };

        Ok(Self {
            out_dir: get("outDir").map(PathBuf::from),
            cache_dir: get("cacheDir").map(PathBuf::from),
            marker_package: get("markerPackage"),
            marker_kinds: None,
            base_path: get("basePath"),
            runtime: get("runtime"),
            timeout_secs,
            bundler: None,
        })
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read the `diwu` object of `package.json`, if there is one.
    pub fn from_package_json(root: &Path) -> Result<Self> {
        let path = root.join(PathsConfig::PACKAGE_JSON);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).with_path("reading", &path)?;
        let package: serde_json::Value =
            serde_json::from_str(&contents).map_err(|e| DiwuError::Config {
                message: format!("Failed to parse {}: {}", path.display(), e),
            })?;

        match package.get("diwu") {
            Some(section) => {
                serde_json::from_value(section.clone()).map_err(|e| DiwuError::Config {
                    message: format!("Invalid \"diwu\" section in {}: {}", path.display(), e),
                })
            }
            None => Ok(Self::default()),
        }
    }
}

impl DiwuConfig {
    /// Built-in defaults for a project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            out_dir: root.join(PathsConfig::OUT_DIR),
            cache_dir: root.join(PathsConfig::CACHE_DIR),
            marker_package: MarkerConfig::PACKAGE.to_string(),
            marker_kinds: MarkerConfig::KINDS.iter().map(|k| k.to_string()).collect(),
            base_path: DispatchConfig::BASE_PATH.to_string(),
            runtime: DispatchConfig::RUNTIME.to_string(),
            worker_timeout: DispatchConfig::WORKER_TIMEOUT,
            bundler_command: DEFAULT_BUNDLER_COMMAND.iter().map(|s| s.to_string()).collect(),
            root,
        }
    }

    /// Resolve defaults, `package.json` and the environment, in that order.
    pub fn resolve(root: impl Into<PathBuf>) -> Result<Self> {
        let mut config = Self::new(root);
        let from_package = ConfigOverrides::from_package_json(&config.root)?;
        config.apply(from_package)?;
        config.apply(ConfigOverrides::from_env()?)?;
        debug!("Resolved diwu config: {:?}", config);
        Ok(config)
    }

    /// Apply every field that is set in `overrides`.
    ///
    /// A zero `timeout_secs` is rejected and leaves the config unchanged.
    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if overrides.timeout_secs == Some(0) {
            return Err(DiwuError::Config {
                message: "timeoutSecs must be at least 1".to_string(),
            });
        }

        if let Some(out_dir) = overrides.out_dir {
            self.out_dir = self.root.join(out_dir);
        }
        if let Some(cache_dir) = overrides.cache_dir {
            self.cache_dir = self.root.join(cache_dir);
        }
        if let Some(package) = overrides.marker_package {
            self.marker_package = package;
        }
        if let Some(kinds) = overrides.marker_kinds {
            self.marker_kinds = kinds;
        }
        if let Some(base_path) = overrides.base_path {
            self.base_path = normalize_base_path(&base_path);
        }
        if let Some(runtime) = overrides.runtime {
            self.runtime = runtime;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.worker_timeout = Duration::from_secs(secs);
        }
        if let Some(bundler) = overrides.bundler {
            self.bundler_command = bundler;
        }
        Ok(())
    }

    /// Directory holding generated worker scripts.
    pub fn scripts_dir(&self) -> PathBuf {
        self.cache_dir.join(PathsConfig::SCRIPTS_DIR_NAME)
    }

    /// Path of the persisted manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.cache_dir.join(PathsConfig::MANIFEST_FILENAME)
    }

    /// Directory the publisher copies worker scripts into.
    pub fn publish_dir(&self) -> PathBuf {
        self.out_dir.join(PathsConfig::SCRIPTS_DIR_NAME)
    }
}

/// Ensure a leading slash and no trailing slash.
fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
