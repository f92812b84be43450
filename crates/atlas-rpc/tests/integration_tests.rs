//! Integration tests for the atlas-rpc JSON-RPC server.
//!
//! These start the real binary on an auto-assigned port and drive the full
//! catalog and combination surface over HTTP.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncBufReadExt;

/// Make an RPC call to the server.
async fn rpc_call(port: u16, method: &str, params: Value) -> Result<Value, String> {
    let json = rpc_call_raw(port, method, params).await?;
    if let Some(error) = json.get("error") {
        return Err(error.to_string());
    }
    Ok(json.get("result").cloned().unwrap_or(Value::Null))
}

/// Make an RPC call and return the full JSON-RPC payload.
async fn rpc_call_raw(port: u16, method: &str, params: Value) -> Result<Value, String> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/rpc", port))
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    response.json::<Value>().await.map_err(|e| e.to_string())
}

/// Check health endpoint.
async fn check_health(port: u16) -> bool {
    let client = reqwest::Client::new();
    if let Ok(response) = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        if let Ok(json) = response.json::<Value>().await {
            return json.get("status").and_then(|v| v.as_str()) == Some("ok");
        }
    }
    false
}

/// Wait for server to be ready.
async fn wait_for_server(port: u16, timeout_secs: u64) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(timeout_secs) {
        if check_health(port).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

struct RpcServerHandle {
    child: tokio::process::Child,
    port: u16,
    stdout_drain: Option<tokio::task::JoinHandle<()>>,
}

impl RpcServerHandle {
    async fn stop(mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }
}

impl Drop for RpcServerHandle {
    fn drop(&mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.start_kill();
    }
}

/// Start the RPC binary and wait until `/health` is ready.
async fn start_rpc_server(data_root: &std::path::Path) -> Result<RpcServerHandle, String> {
    let binary = PathBuf::from(env!("CARGO_BIN_EXE_atlas-rpc"));

    let mut child = tokio::process::Command::new(&binary)
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg("0")
        .arg("--data-root")
        .arg(data_root)
        .arg("--library-root")
        .arg("/library")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("failed to spawn atlas-rpc: {e}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "failed to capture stdout".to_string())?;
    let mut lines = tokio::io::BufReader::new(stdout).lines();

    let mut discovered_port: Option<u16> = None;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(250), lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                if let Some(value) = line.strip_prefix("RPC_PORT=") {
                    let parsed = value
                        .trim()
                        .parse::<u16>()
                        .map_err(|e| format!("invalid RPC_PORT value '{value}': {e}"))?;
                    discovered_port = Some(parsed);
                    break;
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(err)) => return Err(format!("failed to read atlas-rpc stdout: {err}")),
            Err(_) => continue,
        }
    }

    let port =
        discovered_port.ok_or_else(|| "RPC_PORT line not emitted by atlas-rpc".to_string())?;
    if !wait_for_server(port, 15).await {
        return Err(format!("atlas-rpc failed health check on port {port}"));
    }

    let stdout_drain =
        tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });

    Ok(RpcServerHandle {
        child,
        port,
        stdout_drain: Some(stdout_drain),
    })
}

async fn register(port: u16, path: &str, weights: &[f64], clip: Option<bool>) -> String {
    let result = rpc_call(
        port,
        "register_artifact",
        json!({
            "file_path": path,
            "block_weights": weights,
            "clip_contributor": clip,
        }),
    )
    .await
    .unwrap();
    result["artifact"]["stableId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_unknown_method() {
    let temp_dir = TempDir::new().unwrap();
    let server = start_rpc_server(temp_dir.path()).await.unwrap();

    let health = rpc_call(server.port, "health_check", json!({})).await.unwrap();
    assert_eq!(health["status"], "ok");

    let raw = rpc_call_raw(server.port, "does_not_exist", json!({}))
        .await
        .unwrap();
    assert_eq!(raw["error"]["code"], -32603);

    server.stop().await;
}

#[tokio::test]
async fn test_classify_layout() {
    let temp_dir = TempDir::new().unwrap();
    let server = start_rpc_server(temp_dir.path()).await.unwrap();

    let fallback = rpc_call(server.port, "classify_layout", json!({"family": "flux"}))
        .await
        .unwrap();
    assert_eq!(fallback["descriptor"], "flux_fallback_16");
    assert_eq!(fallback["hasBlockWeights"], false);

    let unet = rpc_call(
        server.port,
        "classify_layout",
        json!({"baseModelCode": "SDX", "blockCount": 57}),
    )
    .await
    .unwrap();
    assert_eq!(unet["descriptor"], "unet_57");

    let structured = rpc_call(
        server.port,
        "classify_layout",
        json!({"family": "unet", "block_count": 40}),
    )
    .await
    .unwrap();
    assert_eq!(structured["descriptor"], "unet_unet_40");
    assert_eq!(structured["hasBlockWeights"], true);

    server.stop().await;
}

#[tokio::test]
async fn test_combine_save_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let server = start_rpc_server(temp_dir.path()).await.unwrap();
    let port = server.port;

    let a = register(port, "/library/FLUX/01 - People/a.safetensors", &[1.0, 0.9, 0.8], Some(true)).await;
    let b = register(port, "/library/FLUX/01 - People/b.safetensors", &[0.7, 0.6, 0.5], Some(false)).await;

    let preview = rpc_call(
        port,
        "combine_preview",
        json!({
            "stable_ids": [a, b],
            "cap": 0.8,
            "overrides": {
                a.clone(): {"strength_model": 0.8},
                b.clone(): {"strengthModel": 0.6}
            }
        }),
    )
    .await
    .unwrap();
    let scale = preview["scale"].as_f64().unwrap();
    assert!((scale - 0.6557).abs() < 1e-4);
    assert!(preview["perArtifact"][1]["strengthClip"].is_null());

    let saved = rpc_call(
        port,
        "save_configuration",
        json!({"name": "pair", "result": preview}),
    )
    .await
    .unwrap();
    let id = saved["id"].as_i64().unwrap();

    let loaded = rpc_call(port, "load_configuration", json!({"id": id}))
        .await
        .unwrap();
    assert_eq!(loaded["perArtifact"], preview["perArtifact"]);
    assert_eq!(loaded["scale"], preview["scale"]);

    let found = rpc_call(port, "find_configurations", json!({"stableIds": [b, a]}))
        .await
        .unwrap();
    assert_eq!(found["configurations"].as_array().unwrap().len(), 1);

    rpc_call(port, "delete_configuration", json!({"id": id}))
        .await
        .unwrap();
    let raw = rpc_call_raw(port, "load_configuration", json!({"id": id}))
        .await
        .unwrap();
    assert_eq!(raw["error"]["code"], -32002);

    server.stop().await;
}

#[tokio::test]
async fn test_combination_errors_map_to_codes() {
    let temp_dir = TempDir::new().unwrap();
    let server = start_rpc_server(temp_dir.path()).await.unwrap();

    let raw = rpc_call_raw(
        server.port,
        "combine_preview",
        json!({"stable_ids": ["FLX-PPL-001"], "cap": 0}),
    )
    .await
    .unwrap();
    assert_eq!(raw["error"]["code"], -32006);

    let raw = rpc_call_raw(
        server.port,
        "combine_preview",
        json!({"stable_ids": ["FLX-PPL-001"]}),
    )
    .await
    .unwrap();
    assert_eq!(raw["error"]["code"], -32006);
    assert_eq!(
        raw["error"]["data"]["excluded"][0],
        "FLX-PPL-001: not_found"
    );

    let raw = rpc_call_raw(server.port, "get_artifact", json!({}))
        .await
        .unwrap();
    assert_eq!(raw["error"]["code"], -32602);

    server.stop().await;
}

#[tokio::test]
async fn test_blocks_profiles_and_summary() {
    let temp_dir = TempDir::new().unwrap();
    let server = start_rpc_server(temp_dir.path()).await.unwrap();
    let port = server.port;

    let id = register(port, "/library/FLUX/02 - Styles/ink.safetensors", &[], None).await;

    let blocks = rpc_call(port, "get_blocks", json!({"stable_id": id}))
        .await
        .unwrap();
    assert_eq!(blocks["fallback"], true);
    assert_eq!(blocks["blockLayout"], "flux_fallback_16");
    assert_eq!(blocks["blocks"].as_array().unwrap().len(), 16);

    let csv = rpc_call(port, "export_blocks_csv", json!({"stableId": id}))
        .await
        .unwrap();
    assert!(csv["csv"]
        .as_str()
        .unwrap()
        .starts_with("block_index,weight,raw_strength"));

    let profile = rpc_call(
        port,
        "create_profile",
        json!({"stable_id": id, "profile_name": "soft", "block_weights": vec![0.5; 16]}),
    )
    .await
    .unwrap();
    let profile_id = profile["id"].as_i64().unwrap();

    let updated = rpc_call(
        port,
        "update_profile",
        json!({"stable_id": id, "profile_id": profile_id, "profile_name": "softer"}),
    )
    .await
    .unwrap();
    assert_eq!(updated["profileName"], "softer");

    let listed = rpc_call(port, "list_profiles", json!({"stableId": id}))
        .await
        .unwrap();
    assert_eq!(listed["profiles"].as_array().unwrap().len(), 1);

    rpc_call(
        port,
        "delete_profile",
        json!({"stableId": id, "profileId": profile_id}),
    )
    .await
    .unwrap();

    let marked = rpc_call(
        port,
        "mark_missing",
        json!({"file_path": "/library/FLUX/02 - Styles/ink.safetensors"}),
    )
    .await
    .unwrap();
    assert_eq!(marked["marked"], true);

    let summary = rpc_call(port, "index_summary", json!({})).await.unwrap();
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["missing"], 1);
    assert_eq!(summary["withStableId"], 1);

    let search = rpc_call(port, "search_artifacts", json!({"include_missing": true}))
        .await
        .unwrap();
    assert_eq!(search["total"], 1);

    let report = rpc_call(port, "assign_stable_ids", json!({})).await.unwrap();
    assert_eq!(report["kept"], 1);

    let backfill = rpc_call(port, "backfill_layouts", json!({})).await.unwrap();
    assert_eq!(backfill["updated"], 0);

    server.stop().await;
}
