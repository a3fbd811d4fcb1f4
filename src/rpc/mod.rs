//! JSON-RPC module for daemon communication.
//!
//! Provides the JSON-RPC 2.0 server implementation for:
//! - `submit`: Queue a generation job
//! - `status`: Poll a job
//! - `fetch_asset`: Read rendered audio (base64)
//! - `ping`: Health check
//! - `shutdown`: Graceful shutdown

pub mod methods;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use server::{run_server, serve, ServerState};
pub use types::{
    FetchAssetParams, FetchAssetResult, JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest,
    JsonRpcResponse, RequestId, StatusParams, StatusResult, SubmitParams, SubmitResult,
};
