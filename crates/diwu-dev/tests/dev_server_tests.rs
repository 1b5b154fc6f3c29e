//! Integration tests for the diwu-dev binary.
//!
//! These tests run the real binary: `transform` on a project in a temp dir,
//! then `serve` against the manifest it produced.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncBufReadExt;

const USER_MODULE: &str = r#"import {diwuFn} from "diwu";

export const getUser = diwuFn(async (id) => ({id, name: "x"}));

export const explode = diwuFn(() => {
  throw new Error("kaboom");
});
"#;

fn binary() -> Result<PathBuf, String> {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_diwu-dev") {
        return Ok(PathBuf::from(path));
    }

    let current_exe = std::env::current_exe()
        .map_err(|e| format!("failed to resolve current_exe for fallback: {e}"))?;
    let target_debug_dir = current_exe
        .parent()
        .and_then(|p| p.parent())
        .ok_or_else(|| "failed to resolve target/debug directory for fallback".to_string())?;

    let mut fallback = target_debug_dir.join("diwu-dev");
    if cfg!(target_os = "windows") {
        fallback.set_extension("exe");
    }
    if !fallback.exists() {
        return Err(format!(
            "CARGO_BIN_EXE_diwu-dev not set and fallback binary not found at {}",
            fallback.display()
        ));
    }
    Ok(fallback)
}

fn node_available() -> bool {
    std::process::Command::new("node")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Create a project with one remote module.
fn create_project() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(temp_dir.path().join("src")).unwrap();
    std::fs::write(temp_dir.path().join("src/user.js"), USER_MODULE).unwrap();
    std::fs::write(
        temp_dir.path().join("package.json"),
        r#"{"name": "demo", "private": true, "diwu": {"timeoutSecs": 20}}"#,
    )
    .unwrap();
    temp_dir
}

/// Run `diwu-dev transform --inline` and return the client module.
async fn run_transform(root: &Path) -> Result<String, String> {
    let output = tokio::process::Command::new(binary()?)
        .arg("--root")
        .arg(root)
        .arg("transform")
        .arg("src/user.js")
        .arg("--inline")
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("failed to run diwu-dev transform: {e}"))?;

    if !output.status.success() {
        return Err(format!("diwu-dev transform exited with {}", output.status));
    }
    String::from_utf8(output.stdout).map_err(|e| e.to_string())
}

/// Pull the `{hash}-{name}` key for `name` out of a client module.
fn route_key(client: &str, name: &str) -> Option<String> {
    let suffix = format!("-{}\")", name);
    client.lines().find_map(|line| {
        let end = line.find(&suffix)?;
        let start = line[..end].rfind('"')? + 1;
        Some(format!("{}-{}", &line[start..end], name))
    })
}

/// POST a call and return status plus JSON body.
async fn call(port: u16, key: &str, body: &str) -> Result<(u16, Value), String> {
    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/diwu/{}", port, key))
        .body(body.to_string())
        .timeout(Duration::from_secs(30))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = response.status().as_u16();
    let json = response.json::<Value>().await.map_err(|e| e.to_string())?;
    Ok((status, json))
}

/// A running `diwu-dev serve`; the child is killed on drop.
struct DevServer {
    _child: tokio::process::Child,
    port: u16,
}

/// Start `diwu-dev serve` on an auto-assigned port and wait for `/health`.
async fn start_dev_server(root: &Path) -> Result<DevServer, String> {
    let mut child = tokio::process::Command::new(binary()?)
        .arg("--root")
        .arg(root)
        .args(["serve", "--host", "127.0.0.1", "--port", "0"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn diwu-dev: {e}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "failed to capture stdout".to_string())?;
    let mut lines = tokio::io::BufReader::new(stdout).lines();

    let read_port = async {
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(value) = line.strip_prefix("DIWU_PORT=") {
                return value.trim().parse::<u16>().ok();
            }
        }
        None
    };
    let port = tokio::time::timeout(Duration::from_secs(20), read_port)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| "DIWU_PORT line not emitted by diwu-dev".to_string())?;

    let health = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        if let Ok(response) = reqwest::get(&health).await {
            if response.status().is_success() {
                return Ok(DevServer {
                    _child: child,
                    port,
                });
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(format!("diwu-dev failed health check on port {port}"))
}

#[test]
fn test_route_key_extraction() {
    let client = "import {$diwuFn} from \"diwu\";\n\
                  export const getUser = $diwuFn(\"abc123-getUser\");\n";
    assert_eq!(route_key(client, "getUser").as_deref(), Some("abc123-getUser"));
    assert_eq!(route_key(client, "other"), None);
}

#[tokio::test]
async fn test_transform_prints_client_module() {
    let project = create_project();
    let client = run_transform(project.path()).await.unwrap();

    assert!(client.starts_with("import {$diwuFn} from \"diwu\";"));
    assert!(route_key(&client, "getUser").is_some());
    assert!(route_key(&client, "explode").is_some());
    assert!(!client.contains("kaboom"));
    assert!(project.path().join("node_modules/.diwu/manifest.json").exists());
}

#[tokio::test]
async fn test_serve_rejects_bad_requests() {
    let project = create_project();
    let server = start_dev_server(project.path()).await.unwrap();

    let (status, body) = call(server.port, "0badc0de-getUser", "[]").await.unwrap();
    assert_eq!(status, 200);
    assert!(body["error"].as_str().unwrap().contains("0badc0de"));

    let (status, body) = call(server.port, "0badc0de-getUser", "not json").await.unwrap();
    assert_eq!(status, 400);
    assert!(body.get("error").is_some());

    let response = reqwest::get(format!("http://127.0.0.1:{}/elsewhere", server.port))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_serve_dispatches_to_worker() {
    if !node_available() {
        eprintln!("node not found, skipping");
        return;
    }
    let project = create_project();
    let client = run_transform(project.path()).await.unwrap();
    let server = start_dev_server(project.path()).await.unwrap();

    let key = route_key(&client, "getUser").unwrap();
    let (status, body) = call(server.port, &key, r#"["42"]"#).await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, json!({"data": {"id": "42", "name": "x"}}));

    let key = route_key(&client, "explode").unwrap();
    let (status, body) = call(server.port, &key, "[]").await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, json!({"error": "kaboom"}));

    let missing = key.replace("explode", "missingMethod");
    let (_, body) = call(server.port, &missing, "[]").await.unwrap();
    assert!(!body["error"].as_str().unwrap().is_empty());
}
