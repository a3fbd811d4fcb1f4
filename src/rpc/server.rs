//! JSON-RPC server over stdin/stdout.
//!
//! One request per line in, one response per line out. Logging goes to
//! stderr so stdout carries nothing but responses.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;
use crate::generation::JobManager;

use super::methods::handle_request;
use super::types::{JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse};

/// State shared across all request handlers.
pub struct ServerState {
    /// Job manager owning the worker pool.
    pub jobs: JobManager,
    /// Flag to signal server shutdown.
    shutdown: AtomicBool,
}

impl ServerState {
    /// Creates new server state.
    pub fn new(jobs: JobManager) -> Self {
        Self {
            jobs,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Runs the JSON-RPC server, reading from stdin and writing to stdout.
pub fn run_server(state: ServerState) -> Result<()> {
    let stdin = io::stdin();
    serve(&state, stdin.lock(), io::stdout());
    state.jobs.shutdown();
    Ok(())
}

/// Serves requests from `reader` until end of input or a shutdown request.
pub fn serve<R: BufRead, W: Write>(state: &ServerState, reader: R, mut writer: W) {
    tracing::info!("JSON-RPC server started, waiting for requests");

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "error reading request stream");
                break;
            }
        };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = process_request(&line, state);
        writeln!(writer, "{}", response).ok();
        writer.flush().ok();

        if state.is_shutdown() {
            tracing::info!("server shutdown requested");
            break;
        }
    }

    tracing::info!("JSON-RPC server stopped");
}

/// Processes a single JSON-RPC request line.
fn process_request(line: &str, state: &ServerState) -> String {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            let error = JsonRpcErrorResponse::new(
                None,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            );
            return serde_json::to_string(&error).unwrap_or_default();
        }
    };

    if request.jsonrpc != "2.0" {
        let error = JsonRpcErrorResponse::new(
            Some(request.id),
            JsonRpcError::invalid_request("Invalid JSON-RPC version (expected 2.0)"),
        );
        return serde_json::to_string(&error).unwrap_or_default();
    }

    tracing::debug!(method = %request.method, "request");
    match handle_request(&request.method, request.params, state) {
        Ok(result) => {
            serde_json::to_string(&JsonRpcResponse::new(request.id, result)).unwrap_or_default()
        }
        Err(error) => {
            tracing::debug!(method = %request.method, code = error.code, message = %error.message, "request failed");
            serde_json::to_string(&JsonRpcErrorResponse::new(Some(request.id), error))
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AssetCache;
    use crate::generation::{InMemoryJobStore, JobManagerConfig};
    use crate::test_support::ScriptedRunner;
    use crate::types::{Asset, PassKind};
    use base64::Engine;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::{Duration, Instant, SystemTime};

    struct Fixture {
        state: ServerState,
        assets: Arc<AssetCache>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let assets = Arc::new(AssetCache::new(dir.path()).unwrap());
        let jobs = JobManager::new(
            Arc::new(InMemoryJobStore::new()),
            Arc::new(ScriptedRunner::succeeding()),
            Arc::clone(&assets),
            JobManagerConfig::default(),
        );
        Fixture {
            state: ServerState::new(jobs),
            assets,
            _dir: dir,
        }
    }

    fn call(state: &ServerState, method: &str, params: Value) -> Value {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        serde_json::from_str(&process_request(&request.to_string(), state)).unwrap()
    }

    #[test]
    fn server_state_shutdown() {
        let f = fixture();
        assert!(!f.state.is_shutdown());
        f.state.shutdown();
        assert!(f.state.is_shutdown());
    }

    #[test]
    fn process_invalid_json() {
        let f = fixture();
        let response = process_request("not json", &f.state);
        assert!(response.contains("-32700")); // Parse error
    }

    #[test]
    fn process_invalid_version() {
        let f = fixture();
        let request = r#"{"jsonrpc":"1.0","method":"ping","id":1}"#;
        assert!(process_request(request, &f.state).contains("-32600")); // Invalid request
    }

    #[test]
    fn process_unknown_method() {
        let f = fixture();
        let response = call(&f.state, "generate", Value::Null);
        assert_eq!(response["error"]["code"], -32601);
    }

    #[test]
    fn ping() {
        let f = fixture();
        let response = call(&f.state, "ping", Value::Null);
        assert_eq!(response["result"]["status"], "ok");
        assert_eq!(response["id"], 1);
    }

    #[test]
    fn submit_then_poll_until_completed() {
        let f = fixture();
        let response = call(
            &f.state,
            "submit",
            serde_json::json!({ "seed_tokens": ["BPM_120", "BAR"], "duration_sec": 8, "seed": 4 }),
        );
        let job_id = response["result"]["job_id"].as_str().unwrap().to_string();

        let deadline = Instant::now() + Duration::from_secs(10);
        let status = loop {
            let status = call(&f.state, "status", serde_json::json!({ "job_id": job_id }));
            if status["result"]["status"] == "completed" {
                break status;
            }
            assert!(Instant::now() < deadline, "job did not complete: {}", status);
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(status["result"]["seed"], 4);
        assert!(status["result"]["preview_asset"].is_string());
        assert!(status["result"]["final_asset"].is_string());
    }

    #[test]
    fn submit_rejects_bad_duration() {
        let f = fixture();
        let response = call(&f.state, "submit", serde_json::json!({ "duration_sec": 301 }));
        assert_eq!(response["error"]["code"], -32005);
        assert_eq!(response["error"]["data"]["error_code"], "INVALID_DURATION");
    }

    #[test]
    fn bad_params_are_invalid_params() {
        let f = fixture();
        let response = call(&f.state, "status", serde_json::json!({ "id": 3 }));
        assert_eq!(response["error"]["code"], -32602);
    }

    #[test]
    fn unknown_job_is_not_found() {
        let f = fixture();
        let response = call(&f.state, "status", serde_json::json!({ "job_id": "nope" }));
        assert_eq!(response["error"]["code"], -32007);
        assert_eq!(response["error"]["data"]["error_code"], "JOB_NOT_FOUND");
    }

    #[test]
    fn fetch_asset_returns_base64_bytes() {
        let f = fixture();
        let path = f.assets.wav_path("cafe");
        std::fs::write(&path, b"RIFF-data").unwrap();
        f.assets.insert(Asset {
            asset_id: "cafe".to_string(),
            job_id: "job".to_string(),
            kind: PassKind::Final,
            midi_path: f.assets.midi_path("cafe"),
            path,
            duration_sec: 1.0,
            sample_rate: 32000,
            bpm: 120,
            note_count: 1,
            generation_time_sec: 0.1,
            created_at: SystemTime::now(),
        });

        let response = call(&f.state, "fetch_asset", serde_json::json!({ "asset_id": "cafe" }));
        let result = &response["result"];
        assert_eq!(result["encoding"], "base64");
        assert_eq!(result["size_bytes"], 9);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(result["data"].as_str().unwrap())
            .unwrap();
        assert_eq!(bytes, b"RIFF-data");

        let missing = call(&f.state, "fetch_asset", serde_json::json!({ "asset_id": "beef" }));
        assert_eq!(missing["error"]["data"]["error_code"], "ASSET_NOT_FOUND");
    }

    #[test]
    fn serve_stops_after_shutdown() {
        let f = fixture();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"shutdown"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
            "\n",
        );
        let mut output = Vec::new();
        serve(&f.state, input.as_bytes(), &mut output);

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["result"]["status"], "shutting_down");
        assert!(f.state.is_shutdown());
    }
}
