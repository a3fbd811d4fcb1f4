//! JSON-RPC method handlers.

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::server::ServerState;
use super::types::{
    FetchAssetParams, FetchAssetResult, JsonRpcError, StatusParams, StatusResult, SubmitParams,
    SubmitResult,
};

/// Handles a JSON-RPC method call.
pub fn handle_request(
    method: &str,
    params: serde_json::Value,
    state: &ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        "submit" => handle_submit(params, state),
        "status" => handle_status(params, state),
        "fetch_asset" => handle_fetch_asset(params, state),
        "ping" => handle_ping(),
        "shutdown" => handle_shutdown(state),
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_value<T: Serialize>(result: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

/// Handles the ping method for health checks.
fn handle_ping() -> Result<serde_json::Value, JsonRpcError> {
    Ok(serde_json::json!({ "status": "ok" }))
}

/// Handles the shutdown method.
fn handle_shutdown(state: &ServerState) -> Result<serde_json::Value, JsonRpcError> {
    state.shutdown();
    Ok(serde_json::json!({ "status": "shutting_down" }))
}

/// Queues a job and returns its id.
fn handle_submit(
    params: serde_json::Value,
    state: &ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: SubmitParams = parse_params(params)?;
    let job_id = state
        .jobs
        .submit(params.seed_tokens, params.duration_sec, params.seed)?;
    let status = state.jobs.status(&job_id)?.status;
    to_value(SubmitResult { job_id, status })
}

/// Returns the current state of a job.
fn handle_status(
    params: serde_json::Value,
    state: &ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: StatusParams = parse_params(params)?;
    let job = state.jobs.status(&params.job_id)?;
    to_value(StatusResult::from(job.as_ref()))
}

/// Returns the rendered bytes of an asset, base64-encoded.
fn handle_fetch_asset(
    params: serde_json::Value,
    state: &ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: FetchAssetParams = parse_params(params)?;
    let bytes = state.jobs.fetch_asset(&params.asset_id)?;
    to_value(FetchAssetResult {
        asset_id: params.asset_id,
        encoding: "base64",
        size_bytes: bytes.len(),
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
    })
}
