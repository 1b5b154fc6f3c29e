//! Marker recognition.
//!
//! A marker is a factory imported from the marker package whose name is one of
//! the configured kinds. Only exports initialized by calling a marker binding
//! are remote exports.

use super::module::{ExportKind, ModuleSyntax};
use crate::config::{DiwuConfig, MarkerConfig};
use std::collections::BTreeMap;

/// The closed set of recognized marker kinds for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSet {
    package: String,
    kinds: Vec<String>,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self::new(
            MarkerConfig::PACKAGE,
            MarkerConfig::KINDS.iter().map(|k| k.to_string()).collect(),
        )
    }
}

impl MarkerSet {
    pub fn new(package: impl Into<String>, kinds: Vec<String>) -> Self {
        Self {
            package: package.into(),
            kinds,
        }
    }

    pub fn from_config(config: &DiwuConfig) -> Self {
        Self::new(config.marker_package.clone(), config.marker_kinds.clone())
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn is_marker(&self, name: &str) -> bool {
        self.kinds.iter().any(|k| k == name)
    }

    /// Client-side stub factory for a marker kind, e.g. `$diwuFn`.
    pub fn stub_symbol(kind: &str) -> String {
        format!("{}{}", MarkerConfig::STUB_PREFIX, kind)
    }

    /// Cheap textual precheck: does the source quote the package name at all?
    pub fn mentions_package(&self, source: &str) -> bool {
        source.contains(&format!("'{}'", self.package))
            || source.contains(&format!("\"{}\"", self.package))
    }

    /// Local names bound to marker factories, mapped to their kind.
    pub fn bindings(&self, module: &ModuleSyntax) -> BTreeMap<String, String> {
        module
            .imports
            .iter()
            .filter(|import| import.source == self.package && !import.type_only)
            .flat_map(|import| import.specifiers.iter())
            .filter(|spec| self.is_marker(&spec.imported))
            .map(|spec| (spec.local.clone(), spec.imported.clone()))
            .collect()
    }

    /// Exports whose initializer is a direct call of a marker binding.
    pub fn remote_exports(&self, module: &ModuleSyntax) -> Vec<RemoteExport> {
        let bindings = self.bindings(module);
        if bindings.is_empty() {
            return Vec::new();
        }

        let mut exports = Vec::new();
        for export in &module.exports {
            let ExportKind::Variable(declarators) = &export.kind else {
                continue;
            };
            for declarator in declarators {
                let (Some(name), Some(callee)) = (&declarator.name, &declarator.callee) else {
                    continue;
                };
                if let Some(kind) = bindings.get(callee) {
                    exports.push(RemoteExport {
                        name: name.clone(),
                        kind: kind.clone(),
                    });
                }
            }
        }
        exports
    }
}

/// An exported binding that runs remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteExport {
    pub name: String,
    /// Marker kind the export was created with, e.g. `diwuFn`.
    pub kind: String,
}
