use crate::error::{DiwuError, Result};
use regex::Regex;

/// `{hash}-{method}` parsed from a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteKey {
    pub hash: String,
    pub method: String,
}

/// Matches `<base>/{hash}-{method}` at the end of a request path.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    regex: Regex,
}

impl RoutePattern {
    pub fn new(base_path: &str) -> Result<Self> {
        let base = regex::escape(base_path.trim_matches('/'));
        let pattern = format!(r"(?:^|/){}/([0-9a-z]+)-([0-9A-Za-z_$]+)$", base);
        let regex = Regex::new(&pattern).map_err(|e| DiwuError::Config {
            message: format!("Invalid base path {:?}: {}", base_path, e),
        })?;
        Ok(Self { regex })
    }

    /// Parse a request path; the query string is ignored.
    pub fn parse(&self, path: &str) -> Option<RouteKey> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let captures = self.regex.captures(path)?;
        Some(RouteKey {
            hash: captures.get(1)?.as_str().to_string(),
            method: captures.get(2)?.as_str().to_string(),
        })
    }
}
