//! Worker process execution.
//!
//! Each call spawns one child, writes the request to its stdin, captures at
//! most one reply from its stdout and waits for the exit. Exit is the
//! completion signal; the reply slot is read only after it.

use super::protocol::{parse_reply_line, Reply, WorkerRequest};
use crate::config::DispatchConfig;
use crate::error::{DiwuError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a finished worker left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOutcome {
    /// First reply written by the worker, if any.
    pub reply: Option<Reply>,
    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
}

impl WorkerOutcome {
    /// The reply to relay, falling back to the generic script error.
    pub fn into_reply(self) -> Reply {
        self.reply.unwrap_or_else(Reply::script_error)
    }
}

/// Runs one request against one worker script.
#[async_trait]
pub trait WorkerRunner: Send + Sync {
    async fn run(&self, script: &Path, request: &WorkerRequest) -> Result<WorkerOutcome>;
}

/// Spawns `<runtime> <script>` as an isolated child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    runtime: String,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(runtime: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runtime: runtime.into(),
            timeout,
            working_dir: None,
        }
    }

    /// Run workers from `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl WorkerRunner for ProcessRunner {
    async fn run(&self, script: &Path, request: &WorkerRequest) -> Result<WorkerOutcome> {
        let line = request.to_line()?;
        let spawn_error = |message: String| DiwuError::WorkerSpawn {
            path: script.to_path_buf(),
            message,
        };

        let mut command = Command::new(&self.runtime);
        command
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| spawn_error(format!("{}: {}", self.runtime, e)))?;
        debug!("Spawned worker {} for {}", script.display(), request.method);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("stdout was not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error("stderr was not piped".to_string()))?;

        let label = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (reply_tx, mut reply_rx) = oneshot::channel();
        let mut reader = tokio::spawn(read_replies(label.clone(), stdout, reply_tx));
        let stderr_drain = tokio::spawn(drain_stderr(label.clone(), stderr));

        // A worker stuck before reading stdin must not block past the deadline.
        let writer = tokio::spawn(write_request(label.clone(), child.stdin.take(), line));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|e| DiwuError::io_with_path(e, script))?,
            Err(_) => {
                warn!("[{}] worker exceeded {:?}, killing it", label, self.timeout);
                if let Err(e) = child.kill().await {
                    warn!("[{}] failed to kill worker: {}", label, e);
                }
                writer.abort();
                reader.abort();
                stderr_drain.abort();
                return Err(DiwuError::WorkerTimeout(self.timeout));
            }
        };
        writer.abort();

        // Stdout may still hold the reply after exit.
        if tokio::time::timeout(DispatchConfig::REPLY_DRAIN_TIMEOUT, &mut reader)
            .await
            .is_err()
        {
            debug!("[{}] stdout still open after exit", label);
            reader.abort();
        }
        stderr_drain.abort();

        let reply = reply_rx.try_recv().ok();
        debug!(
            "[{}] worker exited with {:?}, reply: {}",
            label,
            status.code(),
            reply.is_some()
        );
        Ok(WorkerOutcome {
            reply,
            exit_code: status.code(),
        })
    }
}

async fn write_request(label: String, stdin: Option<ChildStdin>, line: String) {
    let Some(mut stdin) = stdin else {
        return;
    };
    if let Err(e) = stdin.write_all(line.as_bytes()).await {
        debug!("[{}] stdin closed before request was written: {}", label, e);
    }
}

/// Forward the first reply line to `slot`; log everything else.
async fn read_replies(label: String, stdout: ChildStdout, slot: oneshot::Sender<Reply>) {
    let mut lines = BufReader::new(stdout).lines();
    let mut slot = Some(slot);

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_reply_line(&line) {
                Some(Ok(reply)) => match slot.take() {
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => warn!("[{}] ignoring extra reply", label),
                },
                Some(Err(e)) => warn!("[{}] {}", label, e),
                None => debug!("[{}] stdout: {}", label, line),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("[{}] error reading worker stdout: {}", label, e);
                break;
            }
        }
    }
}

async fn drain_stderr(label: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("[{}] stderr: {}", label, line);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn runner() -> ProcessRunner {
        ProcessRunner::new("sh", Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_request_reaches_worker() {
        let dir = TempDir::new().unwrap();
        let path = script(
            &dir,
            "echo.sh",
            "read line\nprintf '\\036DIWU:{\"data\":%s}\\n' \"$line\"\n",
        );

        let request = WorkerRequest::new("getUser", vec![json!("42")]);
        let outcome = runner().run(&path, &request).await.unwrap();

        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(
            outcome.reply,
            Some(Reply::data(json!({"method": "getUser", "args": ["42"]})))
        );
    }

    #[tokio::test]
    async fn test_stray_output_is_not_a_reply() {
        let dir = TempDir::new().unwrap();
        let path = script(
            &dir,
            "noisy.sh",
            concat!(
                "read line\n",
                "echo '{\"data\": \"fake\"}'\n",
                "echo oops >&2\n",
                "printf '\\036DIWU:{\"error\":\"boom\"}\\n'\n",
                "printf '\\036DIWU:{\"data\":2}\\n'\n",
                "exit 1\n",
            ),
        );

        let outcome = runner()
            .run(&path, &WorkerRequest::new("m", vec![]))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(1));
        assert_eq!(outcome.reply, Some(Reply::error("boom")));
    }

    #[tokio::test]
    async fn test_exit_without_reply() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "crash.sh", "read line\nexit 3\n");

        let outcome = runner()
            .run(&path, &WorkerRequest::new("m", vec![]))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.into_reply(), Reply::script_error());
    }

    #[tokio::test]
    async fn test_timeout_kills_worker() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "hang.sh", "exec sleep 30\n");

        let started = std::time::Instant::now();
        let result = ProcessRunner::new("sh", Duration::from_millis(200))
            .run(&path, &WorkerRequest::new("m", vec![]))
            .await;

        assert!(matches!(result, Err(DiwuError::WorkerTimeout(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_timeout_covers_unread_request() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "stuck.sh", "exec sleep 30\n");
        let large = "x".repeat(1024 * 1024);

        let started = std::time::Instant::now();
        let result = ProcessRunner::new("sh", Duration::from_millis(300))
            .run(&path, &WorkerRequest::new("m", vec![json!(large)]))
            .await;

        assert!(matches!(result, Err(DiwuError::WorkerTimeout(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_runtime_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "a.sh", "exit 0\n");

        let result = ProcessRunner::new("diwu-no-such-runtime", Duration::from_secs(1))
            .run(&path, &WorkerRequest::new("m", vec![]))
            .await;
        assert!(matches!(result, Err(DiwuError::WorkerSpawn { .. })));
    }
}
