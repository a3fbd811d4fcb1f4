//! Error types for the notegen daemon.
//!
//! Defines all error codes and types used throughout the daemon for
//! consistent error handling and reporting.

use std::fmt;

/// Error codes returned by the daemon in error responses and job records.
///
/// These codes are used in JSON-RPC error responses and in failed job
/// records, and allow clients to programmatically handle specific error
/// conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Model files not found at expected path.
    /// Trigger: `model.onnx` or `tokenizer.json` missing from the model directory.
    ModelNotFound,

    /// Failed to load the model or vocabulary into memory.
    /// Trigger: Corrupt file, wrong format, or OOM during load.
    ModelLoadFailed,

    /// Failed to download model files from the configured source.
    /// Trigger: Network error, disk full during download.
    ModelDownloadFailed,

    /// The distribution source could not produce next-token scores.
    /// Trigger: Model never initialized, inference error, malformed output.
    ModelUnavailable,

    /// The external renderer is missing or failed.
    /// Trigger: Renderer executable or instrument bank missing, non-zero exit.
    RenderingFailed,

    /// Requested duration is outside the valid range.
    InvalidDuration,

    /// Generation or daemon configuration is inconsistent.
    InvalidConfig,

    /// Too many jobs are waiting for a worker, or the manager is shutting down.
    QueueFull,

    /// No job exists with the requested id.
    JobNotFound,

    /// No asset exists with the requested reference.
    AssetNotFound,

    /// A job record was asked to make an illegal state transition.
    InvalidTransition,

    /// A pass panicked on a worker thread.
    WorkerPanicked,
}

/// Coarse grouping of error codes by who should react to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Model missing, unloadable, or failing. Fatal to jobs, retryable per process.
    ModelUnavailable,
    /// Renderer missing or failing. Fatal to the job only.
    Rendering,
    /// Caller sent something unusable.
    Request,
    /// Bookkeeping invariant violated inside the daemon.
    Internal,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::ModelDownloadFailed => "MODEL_DOWNLOAD_FAILED",
            ErrorCode::ModelUnavailable => "MODEL_UNAVAILABLE",
            ErrorCode::RenderingFailed => "RENDERING_FAILED",
            ErrorCode::InvalidDuration => "INVALID_DURATION",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::QueueFull => "QUEUE_FULL",
            ErrorCode::JobNotFound => "JOB_NOT_FOUND",
            ErrorCode::AssetNotFound => "ASSET_NOT_FOUND",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::WorkerPanicked => "WORKER_PANICKED",
        }
    }

    /// Returns the class this code belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorCode::ModelNotFound
            | ErrorCode::ModelLoadFailed
            | ErrorCode::ModelDownloadFailed
            | ErrorCode::ModelUnavailable => ErrorClass::ModelUnavailable,
            ErrorCode::RenderingFailed => ErrorClass::Rendering,
            ErrorCode::InvalidDuration
            | ErrorCode::InvalidConfig
            | ErrorCode::QueueFull
            | ErrorCode::JobNotFound
            | ErrorCode::AssetNotFound => ErrorClass::Request,
            ErrorCode::InvalidTransition | ErrorCode::WorkerPanicked => ErrorClass::Internal,
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => "Model files not found at expected path",
            ErrorCode::ModelLoadFailed => "Failed to load model or vocabulary",
            ErrorCode::ModelDownloadFailed => "Failed to download model files",
            ErrorCode::ModelUnavailable => "The next-token distribution source is unavailable",
            ErrorCode::RenderingFailed => "Rendering the score to audio failed",
            ErrorCode::InvalidDuration => "Duration must be greater than 0 and at most 300 seconds",
            ErrorCode::InvalidConfig => "Configuration values are out of range",
            ErrorCode::QueueFull => "Too many jobs are waiting for a worker",
            ErrorCode::JobNotFound => "No job with this id",
            ErrorCode::AssetNotFound => "No asset with this reference",
            ErrorCode::InvalidTransition => "Illegal job state transition",
            ErrorCode::WorkerPanicked => "A generation pass panicked",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => {
                "Place model.onnx and tokenizer.json in the model directory, \
                 or set NOTEGEN_MODEL_URL so they can be downloaded"
            }
            ErrorCode::ModelLoadFailed => {
                "Verify the model files are not corrupted and were exported for ONNX Runtime, \
                 or delete them and download again"
            }
            ErrorCode::ModelDownloadFailed => {
                "Check the network connection and NOTEGEN_MODEL_URL, then try again"
            }
            ErrorCode::ModelUnavailable => {
                "Restart the daemon so the model is initialized again; check the daemon log for the load error"
            }
            ErrorCode::RenderingFailed => {
                "Install fluidsynth (or set NOTEGEN_RENDERER) and point NOTEGEN_SOUNDFONT at a valid .sf2 file"
            }
            ErrorCode::InvalidDuration => "Specify a duration such as duration_sec: 30",
            ErrorCode::InvalidConfig => "Check the NOTEGEN_* environment variables and CLI flags",
            ErrorCode::QueueFull => "Wait for pending jobs to finish before submitting more",
            ErrorCode::JobNotFound => "Use a job_id returned by submit",
            ErrorCode::AssetNotFound => "Use an asset reference returned by status",
            ErrorCode::InvalidTransition | ErrorCode::WorkerPanicked => {
                "This is a daemon bug; please report it with the daemon log"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for daemon operations.
#[derive(Debug)]
pub struct DaemonError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DaemonError {
    /// Creates a new DaemonError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new DaemonError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a MODEL_NOT_FOUND error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelNotFound,
            format!("Model files not found at: {}", path.into()),
        )
    }

    /// Creates a MODEL_LOAD_FAILED error.
    pub fn model_load_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelLoadFailed,
            format!("Failed to load model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_DOWNLOAD_FAILED error.
    pub fn model_download_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelDownloadFailed,
            format!("Failed to download model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_UNAVAILABLE error.
    pub fn model_unavailable(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelUnavailable,
            format!("Model unavailable: {}", reason.into()),
        )
    }

    /// Creates a RENDERING_FAILED error.
    pub fn rendering_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::RenderingFailed,
            format!("Rendering failed: {}", reason.into()),
        )
    }

    /// Creates an INVALID_DURATION error.
    pub fn invalid_duration(duration: f32) -> Self {
        Self::new(
            ErrorCode::InvalidDuration,
            format!(
                "Invalid duration: {} seconds (must be greater than 0 and at most 300)",
                duration
            ),
        )
    }

    /// Creates an INVALID_CONFIG error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, reason)
    }

    /// Creates a QUEUE_FULL error.
    pub fn queue_full(pending: usize) -> Self {
        Self::new(
            ErrorCode::QueueFull,
            format!("Job queue is full ({} pending jobs)", pending),
        )
    }

    /// Creates a JOB_NOT_FOUND error.
    pub fn job_not_found(job_id: &str) -> Self {
        Self::new(ErrorCode::JobNotFound, format!("Job not found: {}", job_id))
    }

    /// Creates an ASSET_NOT_FOUND error.
    pub fn asset_not_found(asset_id: &str) -> Self {
        Self::new(
            ErrorCode::AssetNotFound,
            format!("Asset not found: {}", asset_id),
        )
    }

    /// Creates an INVALID_TRANSITION error.
    pub fn invalid_transition(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidTransition,
            format!("Job cannot move from {} to {}", from, to),
        )
    }

    /// Creates a WORKER_PANICKED error.
    pub fn worker_panicked(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::WorkerPanicked,
            format!("Worker panicked: {}", reason.into()),
        )
    }
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for DaemonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using DaemonError.
pub type Result<T> = std::result::Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: [ErrorCode; 12] = [
        ErrorCode::ModelNotFound,
        ErrorCode::ModelLoadFailed,
        ErrorCode::ModelDownloadFailed,
        ErrorCode::ModelUnavailable,
        ErrorCode::RenderingFailed,
        ErrorCode::InvalidDuration,
        ErrorCode::InvalidConfig,
        ErrorCode::QueueFull,
        ErrorCode::JobNotFound,
        ErrorCode::AssetNotFound,
        ErrorCode::InvalidTransition,
        ErrorCode::WorkerPanicked,
    ];

    #[test]
    fn error_code_as_str() {
        assert_eq!(ErrorCode::ModelNotFound.as_str(), "MODEL_NOT_FOUND");
        assert_eq!(ErrorCode::ModelUnavailable.as_str(), "MODEL_UNAVAILABLE");
        assert_eq!(ErrorCode::RenderingFailed.as_str(), "RENDERING_FAILED");
        assert_eq!(ErrorCode::JobNotFound.as_str(), "JOB_NOT_FOUND");
        assert_eq!(ErrorCode::AssetNotFound.as_str(), "ASSET_NOT_FOUND");
    }

    #[test]
    fn error_code_recovery_hints_not_empty() {
        for code in ALL_CODES {
            assert!(!code.recovery_hint().is_empty(), "{code} has no hint");
            assert!(!code.description().is_empty(), "{code} has no description");
        }
    }

    #[test]
    fn error_classes() {
        assert_eq!(ErrorCode::ModelLoadFailed.class(), ErrorClass::ModelUnavailable);
        assert_eq!(ErrorCode::ModelUnavailable.class(), ErrorClass::ModelUnavailable);
        assert_eq!(ErrorCode::RenderingFailed.class(), ErrorClass::Rendering);
        assert_eq!(ErrorCode::JobNotFound.class(), ErrorClass::Request);
        assert_eq!(ErrorCode::InvalidTransition.class(), ErrorClass::Internal);
        assert_eq!(ErrorCode::WorkerPanicked.class(), ErrorClass::Internal);
    }

    #[test]
    fn daemon_error_display() {
        let err = DaemonError::invalid_duration(400.0);
        assert!(err.to_string().contains("INVALID_DURATION"));
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("Recovery:"));
    }

    #[test]
    fn daemon_error_keeps_source() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = DaemonError::with_source(ErrorCode::RenderingFailed, "spawn failed", io);
        assert!(err.source().is_some());
    }
}
