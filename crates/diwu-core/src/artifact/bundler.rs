//! Bundlers turning an entry module into one self-contained CommonJS script.

use crate::error::{DiwuError, IoResultExt, Result};
use crate::transform::module::{ExportKind, ModuleSyntax};
use crate::transform::MarkerSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Placeholder replaced by the entry path in bundler command lines.
pub const ENTRY_PLACEHOLDER: &str = "{entry}";

/// Produces bundled CommonJS code for an entry module.
pub trait Bundler: Send + Sync {
    fn bundle(&self, entry: &Path) -> Result<String>;
}

/// Runs an external bundler and captures its stdout.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    command: Vec<String>,
    working_dir: PathBuf,
}

impl CommandBundler {
    pub fn new(command: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            working_dir: working_dir.into(),
        }
    }

    fn build_args(&self, entry: &Path) -> Vec<String> {
        let entry = entry.to_string_lossy();
        let mut args: Vec<String> = self
            .command
            .iter()
            .map(|arg| arg.replace(ENTRY_PLACEHOLDER, &entry))
            .collect();
        if !self.command.iter().any(|arg| arg.contains(ENTRY_PLACEHOLDER)) {
            args.push(entry.into_owned());
        }
        args
    }
}

impl Bundler for CommandBundler {
    fn bundle(&self, entry: &Path) -> Result<String> {
        let failed = |message: String| DiwuError::BundleFailed {
            module_id: entry.display().to_string(),
            message,
        };

        let args = self.build_args(entry);
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| failed("empty bundler command".to_string()))?;

        debug!("Bundling {} with {}", entry.display(), program);
        let output = Command::new(program)
            .args(rest)
            .current_dir(&self.working_dir)
            .output()
            .map_err(|e| failed(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| failed(format!("bundler output is not UTF-8: {}", e)))
    }
}

/// Bundles dependency-free modules without an external tool.
///
/// Marker imports become identity shims and `export` syntax is stripped, so
/// every export stays a top-level binding of the script. Any other runtime
/// import is rejected.
#[derive(Debug, Clone, Default)]
pub struct InlineBundler {
    markers: MarkerSet,
}

impl InlineBundler {
    pub fn new(markers: MarkerSet) -> Self {
        Self { markers }
    }

    /// Bundle module text directly.
    pub fn bundle_source(&self, module_id: &str, source: &str) -> Result<String> {
        let failed = |message: String| DiwuError::BundleFailed {
            module_id: module_id.to_string(),
            message,
        };

        let module = ModuleSyntax::parse(module_id, source)?;
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();

        for import in &module.imports {
            if import.type_only {
                edits.push((import.span.clone(), String::new()));
                continue;
            }
            if import.source != self.markers.package() {
                return Err(failed(format!("cannot inline import of \"{}\"", import.source)));
            }
            if import.default.is_some() || import.namespace.is_some() {
                return Err(failed(format!("unsupported import form from \"{}\"", import.source)));
            }

            let mut shims = String::new();
            for spec in &import.specifiers {
                if !self.markers.is_marker(&spec.imported) {
                    return Err(failed(format!(
                        "\"{}\" is not a marker of \"{}\"",
                        spec.imported, import.source
                    )));
                }
                shims.push_str(&format!("const {} = (f) => f;", spec.local));
            }
            edits.push((import.span.clone(), shims));
        }

        for export in &module.exports {
            match &export.kind {
                ExportKind::Variable(_) | ExportKind::Declaration => {
                    edits.push((export.keyword_span.clone(), String::new()));
                }
                ExportKind::Default => {
                    edits.push((
                        export.keyword_span.clone(),
                        "module.exports.default = ".to_string(),
                    ));
                }
                ExportKind::List => edits.push((export.span.clone(), String::new())),
                ExportKind::ReExport { source } => {
                    return Err(failed(format!("cannot inline re-export of \"{}\"", source)));
                }
            }
        }

        edits.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
        let mut code = source.to_string();
        for (range, replacement) in edits {
            code.replace_range(range, &replacement);
        }
        Ok(code)
    }
}

impl Bundler for InlineBundler {
    fn bundle(&self, entry: &Path) -> Result<String> {
        let source = std::fs::read_to_string(entry).with_path("reading", entry)?;
        self.bundle_source(&entry.display().to_string(), &source)
    }
}
