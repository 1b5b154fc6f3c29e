//! Content hashing for module sources.
//!
//! The hash is an HMAC-SHA256 over the untransformed module text under a
//! static key. It names the worker script and prefixes every route key, so it
//! must only depend on the source text.

use crate::config::HashConfig;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex digest of a module's original source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash `source` with the built-in key.
    pub fn of(source: &str) -> Self {
        Self::with_key(HashConfig::KEY, source)
    }

    /// Hash `source` with an explicit key.
    pub fn with_key(key: &[u8], source: &str) -> Self {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(source.as_bytes());
        Self(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Route key for one exported method: `{hash}-{name}`.
    pub fn route_key(&self, export_name: &str) -> String {
        format!("{}-{}", self.0, export_name)
    }

    /// File name of the worker script for this hash.
    pub fn script_file_name(&self) -> String {
        format!("{}.{}", self.0, crate::config::PathsConfig::SCRIPT_EXTENSION)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
