//! Worker protocol types and framing.
//!
//! One request line on the worker's stdin, one reply line on its stdout:
//!
//! ```text
//! stdin:  {"method":"getUser","args":["42"]}\n
//! stdout: \x1eDIWU:{"data":{"id":"42"}}\n
//! ```
//!
//! The record-separator prefix keeps `console.log` output of the module itself
//! from being taken as the reply.

use crate::config::DispatchConfig;
use crate::error::{DiwuError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix marking the reply line on a worker's stdout.
pub const REPLY_PREFIX: &str = "\u{1e}DIWU:";

/// The single request sent to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub method: String,
    pub args: Vec<Value>,
}

impl WorkerRequest {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// Encode as one newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Reply payload, relayed verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Error { error: String },
    Data { data: Value },
}

impl Reply {
    pub fn data(data: Value) -> Self {
        Reply::Data { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            error: message.into(),
        }
    }

    /// Reply used when a worker exits without answering.
    pub fn script_error() -> Self {
        Self::error(DispatchConfig::DEFAULT_ERROR)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }
}

impl From<&DiwuError> for Reply {
    fn from(err: &DiwuError) -> Self {
        Reply::error(err.to_string())
    }
}

/// Parse one stdout line of a worker.
///
/// Returns `None` for lines that are not replies.
pub fn parse_reply_line(line: &str) -> Option<Result<Reply>> {
    let payload = line.trim_end_matches(['\r', '\n']).strip_prefix(REPLY_PREFIX)?;
    Some(serde_json::from_str(payload).map_err(|e| DiwuError::Json {
        message: format!("Invalid worker reply: {}", e),
        source: Some(e),
    }))
}
