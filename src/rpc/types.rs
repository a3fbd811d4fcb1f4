//! JSON-RPC types for the daemon protocol.

use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, ErrorCode};
use crate::types::{Job, JobError, JobStatus};

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// Duration used when a submit request does not name one.
pub const DEFAULT_DURATION_SEC: f32 = 30.0;

/// A JSON-RPC request ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequestId {
    Integer(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Integer(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

/// A JSON-RPC request wrapper.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub id: RequestId,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A JSON-RPC response wrapper.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub result: T,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(id: RequestId, result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonRpcErrorData>,
}

/// Extended error data for application-specific errors.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorData {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JsonRpcError {
    /// Creates a parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an invalid request error (-32600).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a method not found error (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    /// Creates an invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }
}

/// JSON-RPC error code carried by each daemon error code.
pub fn rpc_code(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ModelNotFound => -32000,
        ErrorCode::ModelLoadFailed => -32001,
        ErrorCode::ModelDownloadFailed => -32002,
        ErrorCode::ModelUnavailable => -32003,
        ErrorCode::QueueFull => -32004,
        ErrorCode::InvalidDuration => -32005,
        ErrorCode::RenderingFailed => -32006,
        ErrorCode::JobNotFound => -32007,
        ErrorCode::AssetNotFound => -32008,
        ErrorCode::InvalidConfig => -32009,
        ErrorCode::InvalidTransition | ErrorCode::WorkerPanicked => -32603,
    }
}

impl From<&DaemonError> for JsonRpcError {
    fn from(err: &DaemonError) -> Self {
        Self {
            code: rpc_code(err.code),
            message: err.code.description().to_string(),
            data: Some(JsonRpcErrorData {
                error_code: err.code.as_str().to_string(),
                details: Some(err.message.clone()),
            }),
        }
    }
}

impl From<DaemonError> for JsonRpcError {
    fn from(err: DaemonError) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// Requests and results
// ============================================================================

/// Parameters for a submit request.
#[derive(Debug, Deserialize)]
pub struct SubmitParams {
    /// Control tokens to start from; empty uses the default seed.
    #[serde(default)]
    pub seed_tokens: Vec<String>,

    /// Requested duration in seconds, in (0, 300].
    #[serde(default = "default_duration")]
    pub duration_sec: f32,

    /// Random seed for reproducibility; null for random.
    pub seed: Option<u64>,
}

fn default_duration() -> f32 {
    DEFAULT_DURATION_SEC
}

/// Response for a submit request.
#[derive(Debug, Serialize)]
pub struct SubmitResult {
    pub job_id: String,
    pub status: JobStatus,
}

/// Parameters naming a job.
#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub job_id: String,
}

/// Response for a status request.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    pub job_id: String,
    pub status: JobStatus,
    pub target_seconds: f32,
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl From<&Job> for StatusResult {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            target_seconds: job.target_seconds,
            seed: job.seed,
            preview_asset: job.preview_asset.clone(),
            final_asset: job.final_asset.clone(),
            error: job.error.clone(),
        }
    }
}

/// Parameters naming an asset.
#[derive(Debug, Deserialize)]
pub struct FetchAssetParams {
    pub asset_id: String,
}

/// Response for a fetch_asset request.
#[derive(Debug, Serialize)]
pub struct FetchAssetResult {
    pub asset_id: String,
    /// Always `base64`.
    pub encoding: &'static str,
    pub size_bytes: usize,
    pub data: String,
}
