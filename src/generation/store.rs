//! Job table shared between the request surface and workers.
//!
//! Records are published as `Arc<Job>` and replaced whole on every
//! transition, so a reader always sees one consistent record. Finished
//! records are kept up to a limit; the oldest are forgotten first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{DaemonError, Result};
use crate::types::Job;

/// Default number of completed or failed jobs kept for status queries.
pub const DEFAULT_MAX_FINISHED: usize = 100;

/// Concurrent map from job id to the current job record.
pub trait JobStore: Send + Sync {
    /// Adds a new job record.
    fn insert(&self, job: Job) -> Result<()>;

    /// Returns the current record of a job.
    fn get(&self, job_id: &str) -> Option<Arc<Job>>;

    /// Replaces the record of an existing job.
    ///
    /// Fails with JOB_NOT_FOUND for unknown ids and with INVALID_TRANSITION
    /// when the stored record is terminal or the new status does not follow
    /// from the stored one.
    fn replace(&self, job: Job) -> Result<Arc<Job>>;

    /// Number of stored jobs.
    fn len(&self) -> usize;

    /// Returns true if no jobs are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Job store backed by a `RwLock<HashMap>`.
pub struct InMemoryJobStore {
    inner: RwLock<Table>,
    max_finished: usize,
}

#[derive(Default)]
struct Table {
    jobs: HashMap<String, Arc<Job>>,
    /// Ids of terminal records, oldest first.
    finished: VecDeque<String>,
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_FINISHED)
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that keeps at most `max_finished` terminal records.
    ///
    /// Queued and running jobs are never dropped.
    pub fn with_capacity(max_finished: usize) -> Self {
        Self {
            inner: RwLock::new(Table::default()),
            max_finished: max_finished.max(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: Job) -> Result<()> {
        let mut table = self.write();
        if table.jobs.contains_key(&job.job_id) {
            return Err(DaemonError::invalid_transition("(existing)", job.status));
        }
        table.jobs.insert(job.job_id.clone(), Arc::new(job));
        Ok(())
    }

    fn get(&self, job_id: &str) -> Option<Arc<Job>> {
        self.read().jobs.get(job_id).cloned()
    }

    fn replace(&self, job: Job) -> Result<Arc<Job>> {
        let mut table = self.write();
        let current = table
            .jobs
            .get(&job.job_id)
            .ok_or_else(|| DaemonError::job_not_found(&job.job_id))?;

        if !current.status.can_transition_to(job.status) {
            return Err(DaemonError::invalid_transition(current.status, job.status));
        }

        let record = Arc::new(job);
        table.jobs.insert(record.job_id.clone(), Arc::clone(&record));

        if record.status.is_terminal() {
            table.finished.push_back(record.job_id.clone());
            while table.finished.len() > self.max_finished {
                if let Some(oldest) = table.finished.pop_front() {
                    table.jobs.remove(&oldest);
                    tracing::debug!(job_id = %oldest, "dropped finished job record");
                }
            }
        }
        Ok(record)
    }

    fn len(&self) -> usize {
        self.read().jobs.len()
    }
}
