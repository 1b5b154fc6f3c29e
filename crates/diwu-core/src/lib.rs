//! diwu core - server functions extracted from client modules.
//!
//! Exported bindings created with a marker factory (`diwuFn`, `diwuHook`) are
//! replaced in the client build by stubs carrying a `{hash}-{name}` route key.
//! The original module is bundled into a worker script that answers exactly
//! one call per process; the dispatcher routes calls to those scripts through
//! the manifest.
//!
//! # Example
//!
//! ```rust,ignore
//! use diwu_core::{DiwuConfig, DiwuPlugin};
//!
//! let plugin = DiwuPlugin::new(DiwuConfig::resolve(".")?)?;
//! if let Some(code) = plugin.transform(&source, "/app/src/user.ts") {
//!     // hand `code` back to the bundler
//! }
//! plugin.on_finish(false)?;
//! ```

pub mod artifact;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod plugin;
pub mod publish;
pub mod transform;
pub mod worker;

pub use artifact::{ArtifactBuilder, Bundler, CommandBundler, InlineBundler};
pub use config::{ConfigOverrides, DiwuConfig};
pub use dispatch::{DispatchResponse, Dispatcher, RouteKey, RoutePattern};
pub use error::{DiwuError, Result};
pub use hash::ContentHash;
pub use manifest::{JsonFileStore, Manifest, ManifestStore, MemoryStore};
pub use plugin::{DiwuPlugin, DiwuPluginBuilder, TransformOutput};
pub use publish::publish_scripts;
pub use transform::{MarkerSet, MarkerTransform, ModuleAnalysis, RemoteExport};
pub use worker::{ProcessRunner, Reply, WorkerOutcome, WorkerRequest, WorkerRunner};
