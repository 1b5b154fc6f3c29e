//! Marker transform.
//!
//! Finds exported bindings created by a marker factory and replaces the module
//! with client stubs that only carry a `{hash}-{name}` route key.

pub mod marker;
pub mod module;

pub use marker::{MarkerSet, RemoteExport};
pub use module::ModuleSyntax;

use crate::error::Result;
use crate::hash::ContentHash;
use std::collections::BTreeSet;
use tracing::debug;

/// Result of analyzing one module that has remote exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAnalysis {
    pub hash: ContentHash,
    pub exports: Vec<RemoteExport>,
}

impl ModuleAnalysis {
    /// Names of the remote exports, in source order.
    pub fn export_names(&self) -> Vec<String> {
        self.exports.iter().map(|e| e.name.clone()).collect()
    }
}

/// Detects remote exports and renders the client replacement module.
#[derive(Debug, Clone, Default)]
pub struct MarkerTransform {
    markers: MarkerSet,
}

impl MarkerTransform {
    pub fn new(markers: MarkerSet) -> Self {
        Self { markers }
    }

    /// Analyze `source`. `Ok(None)` means the module is left untouched.
    pub fn analyze(&self, source: &str, module_id: &str) -> Result<Option<ModuleAnalysis>> {
        if !self.markers.mentions_package(source) {
            return Ok(None);
        }

        let module = ModuleSyntax::parse(module_id, source)?;
        let exports = self.markers.remote_exports(&module);
        if exports.is_empty() {
            debug!("{} imports {} but has no remote exports", module_id, self.markers.package());
            return Ok(None);
        }

        Ok(Some(ModuleAnalysis {
            hash: ContentHash::of(source),
            exports,
        }))
    }

    /// Render the client module for an analysis.
    ///
    /// ```text
    /// import {$diwuFn} from "diwu";
    /// export const getUser = $diwuFn("<hash>-getUser");
    /// ```
    pub fn render_client_module(&self, analysis: &ModuleAnalysis) -> String {
        let kinds: BTreeSet<&str> = analysis.exports.iter().map(|e| e.kind.as_str()).collect();
        let stubs: Vec<String> = kinds.iter().map(|k| MarkerSet::stub_symbol(k)).collect();

        let mut code = format!(
            "import {{{}}} from {};\n",
            stubs.join(", "),
            js_string(self.markers.package())
        );
        for export in &analysis.exports {
            code.push_str(&format!(
                "export const {} = {}({});\n",
                export.name,
                MarkerSet::stub_symbol(&export.kind),
                js_string(&analysis.hash.route_key(&export.name))
            ));
        }
        code
    }
}

/// Quote a string as a JS string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
