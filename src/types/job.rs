//! Job type for tracking score generation requests.
//!
//! A Job tracks a request from submission through completion. Records are
//! never mutated in place once published: every transition builds a new
//! record that replaces the old one in the job store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use crate::error::{DaemonError, Result};

/// Status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for a worker.
    #[default]
    Queued,
    /// A worker is running the preview or final pass.
    Running,
    /// The preview pass finished; the final pass is still running.
    PartialReady,
    /// The final pass finished successfully.
    Completed,
    /// A pass failed.
    Failed,
}

impl JobStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::PartialReady => "partial_ready",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Returns true if the job is actively being processed.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::PartialReady)
    }

    /// Returns true if `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Running, PartialReady)
                | (Running, Completed)
                | (Running, Failed)
                | (PartialReady, Completed)
                | (PartialReady, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error recorded on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Error code, e.g. `RENDERING_FAILED`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&DaemonError> for JobError {
    fn from(err: &DaemonError) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
        }
    }
}

/// A request for score generation, tracked from submission through completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (UUID v4 format).
    pub job_id: String,

    /// Control tokens the decode starts from.
    pub seed_tokens: Vec<String>,

    /// Requested musical duration of the final pass in seconds.
    pub target_seconds: f32,

    /// Random seed for sampling.
    pub seed: u64,

    /// Current job state.
    pub status: JobStatus,

    /// Asset reference of the preview render, once available.
    pub preview_asset: Option<String>,

    /// Asset reference of the final render, once available.
    pub final_asset: Option<String>,

    /// Error details if the job failed.
    pub error: Option<JobError>,

    /// When the job was submitted.
    #[serde(with = "system_time_serde")]
    pub created_at: SystemTime,

    /// When a worker picked the job up.
    #[serde(with = "option_system_time_serde")]
    pub started_at: Option<SystemTime>,

    /// When the job reached a terminal state.
    #[serde(with = "option_system_time_serde")]
    pub completed_at: Option<SystemTime>,
}

impl Job {
    /// Creates a new queued Job.
    ///
    /// A random seed is drawn when none is given.
    pub fn new(seed_tokens: Vec<String>, target_seconds: f32, seed: Option<u64>) -> Self {
        Self {
            job_id: generate_uuid_v4(),
            seed_tokens,
            target_seconds,
            seed: seed.unwrap_or_else(rand::random),
            status: JobStatus::Queued,
            preview_asset: None,
            final_asset: None,
            error: None,
            created_at: SystemTime::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Returns the record a worker publishes when it picks the job up.
    pub fn started(&self) -> Result<Job> {
        let mut next = self.advance(JobStatus::Running)?;
        next.started_at = Some(SystemTime::now());
        Ok(next)
    }

    /// Returns the record published after a successful preview pass.
    pub fn preview_ready(&self, asset_id: &str) -> Result<Job> {
        let mut next = self.advance(JobStatus::PartialReady)?;
        next.preview_asset = Some(asset_id.to_string());
        Ok(next)
    }

    /// Returns the record published after a successful final pass.
    pub fn completed(&self, asset_id: &str) -> Result<Job> {
        let mut next = self.advance(JobStatus::Completed)?;
        next.final_asset = Some(asset_id.to_string());
        next.completed_at = Some(SystemTime::now());
        Ok(next)
    }

    /// Returns the record published when a pass fails.
    ///
    /// A preview asset that was already published stays on the record.
    pub fn failed(&self, error: &DaemonError) -> Result<Job> {
        let mut next = self.advance(JobStatus::Failed)?;
        next.error = Some(JobError::from(error));
        next.completed_at = Some(SystemTime::now());
        Ok(next)
    }

    fn advance(&self, next: JobStatus) -> Result<Job> {
        if !self.status.can_transition_to(next) {
            return Err(DaemonError::invalid_transition(self.status, next));
        }
        let mut job = self.clone();
        job.status = next;
        Ok(job)
    }
}

/// Generates a UUID v4 string from random bytes.
fn generate_uuid_v4() -> String {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = 0x40 | (bytes[6] & 0x0f); // Version 4
    bytes[8] = 0x80 | (bytes[8] & 0x3f); // Variant 1

    let hex = hex::encode(bytes);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Custom serde implementation for SystemTime.
pub(crate) mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

/// Custom serde implementation for Option<SystemTime>.
mod option_system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => {
                let duration = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
                Some(duration.as_secs()).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<u64>::deserialize(deserializer)?;
        Ok(opt.map(|secs| UNIX_EPOCH + Duration::from_secs(secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> Job {
        Job::new(vec!["BPM_120".to_string(), "BAR".to_string()], 30.0, Some(42))
    }

    #[test]
    fn job_status_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::PartialReady.is_terminal());
    }

    #[test]
    fn job_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::PartialReady).unwrap();
        assert_eq!(json, "\"partial_ready\"");
    }

    #[test]
    fn terminal_states_have_no_successors() {
        let all = [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::PartialReady,
            JobStatus::Completed,
            JobStatus::Failed,
        ];
        for next in all {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn happy_path_with_preview() {
        let job = test_job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.seed, 42);

        let running = job.started().unwrap();
        assert!(running.started_at.is_some());

        let partial = running.preview_ready("aaaa").unwrap();
        assert_eq!(partial.status, JobStatus::PartialReady);
        assert_eq!(partial.preview_asset.as_deref(), Some("aaaa"));

        let done = partial.completed("bbbb").unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.preview_asset.as_deref(), Some("aaaa"));
        assert_eq!(done.final_asset.as_deref(), Some("bbbb"));
        assert!(done.completed_at.is_some());

        // The earlier record is untouched.
        assert_eq!(running.status, JobStatus::Running);
    }

    #[test]
    fn failure_keeps_preview_asset() {
        let partial = test_job().started().unwrap().preview_ready("aaaa").unwrap();
        let failed = partial
            .failed(&DaemonError::rendering_failed("exit status 1"))
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.preview_asset.as_deref(), Some("aaaa"));
        let error = failed.error.unwrap();
        assert_eq!(error.code, "RENDERING_FAILED");
        assert!(error.message.contains("exit status 1"));
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let job = test_job();
        assert!(job.completed("x").is_err());
        assert!(job.preview_ready("x").is_err());

        let done = job.started().unwrap().completed("x").unwrap();
        assert!(done.failed(&DaemonError::model_unavailable("late")).is_err());
        assert!(done.started().is_err());
    }

    #[test]
    fn uuid_format() {
        let id = test_job().job_id;
        assert_eq!(id.len(), 36);
        assert_eq!(&id[14..15], "4");
        assert_ne!(id, test_job().job_id);
    }

    #[test]
    fn random_seed_when_absent() {
        let job = Job::new(vec![], 10.0, None);
        let json = serde_json::to_value(&job).unwrap();
        assert!(json["seed"].is_u64());
        assert_eq!(json["status"], "queued");
    }
}
