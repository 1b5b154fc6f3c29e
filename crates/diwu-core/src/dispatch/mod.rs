//! Dispatch of `{hash}-{method}` calls to worker processes.
//!
//! Transport-agnostic: the dev server hands over the request path and raw
//! body and writes back whatever [`DispatchResponse`] says.

mod route;

pub use route::{RouteKey, RoutePattern};

use crate::error::{DiwuError, Result};
use crate::manifest::Manifest;
use crate::worker::{Reply, WorkerRequest, WorkerRunner};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a handled call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub reply: Reply,
    /// The request itself was malformed.
    pub client_error: bool,
}

impl DispatchResponse {
    fn ok(reply: Reply) -> Self {
        Self {
            reply,
            client_error: false,
        }
    }

    fn failed(err: &DiwuError) -> Self {
        Self {
            reply: Reply::from(err),
            client_error: err.is_client_error(),
        }
    }
}

/// Resolves route keys through the manifest and runs one worker per call.
#[derive(Clone)]
pub struct Dispatcher {
    pattern: RoutePattern,
    manifest: Arc<Manifest>,
    runner: Arc<dyn WorkerRunner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        base_path: &str,
        manifest: Arc<Manifest>,
        runner: Arc<dyn WorkerRunner>,
    ) -> Result<Self> {
        Ok(Self {
            pattern: RoutePattern::new(base_path)?,
            manifest,
            runner,
        })
    }

    /// Handle one request. `None` means the path is not a dispatch route.
    pub async fn handle(&self, path: &str, body: &[u8]) -> Option<DispatchResponse> {
        let key = self.pattern.parse(path)?;
        debug!("Dispatching {}-{}", key.hash, key.method);

        let response = match self.call(&key, body).await {
            Ok(reply) => DispatchResponse::ok(reply),
            Err(e) => {
                warn!("Call {}-{} failed: {}", key.hash, key.method, e);
                DispatchResponse::failed(&e)
            }
        };
        Some(response)
    }

    async fn call(&self, key: &RouteKey, body: &[u8]) -> Result<Reply> {
        let args = parse_args(body)?;

        let script = self
            .manifest
            .resolve_hash(&key.hash)
            .filter(|path| path.is_file())
            .ok_or_else(|| DiwuError::ScriptNotFound {
                hash: key.hash.clone(),
            })?;

        let request = WorkerRequest::new(key.method.clone(), args);
        let outcome = self.runner.run(&script, &request).await?;
        Ok(outcome.into_reply())
    }
}

/// Decode the request body as the argument list. An empty body is `[]`.
pub fn parse_args(body: &[u8]) -> Result<Vec<Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(args)) => Ok(args),
        Ok(other) => Err(DiwuError::InvalidArgs {
            message: format!("expected a JSON array, got {}", json_type(&other)),
        }),
        Err(e) => Err(DiwuError::InvalidArgs {
            message: e.to_string(),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
