//! Job lifecycle manager.
//!
//! Submissions are stored as queued jobs and their ids are handed to a
//! fixed pool of worker threads over an mpsc channel. Each worker owns the
//! job it picked up and is the only writer of that job's record until the
//! record is terminal.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::cache::AssetCache;
use crate::error::{DaemonError, ErrorCode, Result};
use crate::types::token::seed_or_default;
use crate::types::{Job, PassKind};

use super::pipeline::PassRunner;
use super::store::JobStore;

/// Longest duration a job may request, in seconds.
pub const MAX_DURATION_SEC: f32 = 300.0;

/// Default number of jobs allowed to wait for a worker.
pub const DEFAULT_MAX_PENDING: usize = 10;

/// Worker pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobManagerConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Jobs allowed to wait for a worker before submissions are refused.
    pub max_pending: usize,
    /// Run a preview pass before the final pass.
    pub preview: bool,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_pending: DEFAULT_MAX_PENDING,
            preview: true,
        }
    }
}

/// Message sent to the worker pool.
#[derive(Debug)]
enum WorkerMessage {
    /// A queued job is ready to be picked up.
    JobAdded(String),
    /// Request for one worker to exit.
    Shutdown,
}

/// Checks that a requested duration is finite and in (0, 300] seconds.
pub fn validate_duration(target_seconds: f32) -> Result<()> {
    if target_seconds.is_finite() && target_seconds > 0.0 && target_seconds <= MAX_DURATION_SEC {
        Ok(())
    } else {
        Err(DaemonError::invalid_duration(target_seconds))
    }
}

/// Accepts jobs, runs them on worker threads, and answers status queries.
pub struct JobManager {
    store: Arc<dyn JobStore>,
    assets: Arc<AssetCache>,
    sender: Mutex<Option<Sender<WorkerMessage>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    max_pending: usize,
}

impl JobManager {
    /// Starts the worker pool.
    pub fn new(
        store: Arc<dyn JobStore>,
        runner: Arc<dyn PassRunner>,
        assets: Arc<AssetCache>,
        config: JobManagerConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerMessage>();
        let receiver = Arc::new(Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));

        let workers = (0..config.workers.max(1))
            .map(|index| {
                let worker = Worker {
                    store: Arc::clone(&store),
                    runner: Arc::clone(&runner),
                    preview: config.preview,
                };
                let receiver = Arc::clone(&receiver);
                let pending = Arc::clone(&pending);
                thread::Builder::new()
                    .name(format!("notegen-worker-{}", index))
                    .spawn(move || worker_loop(worker, receiver, pending))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!(error = %e, "failed to spawn worker thread");
                    None
                }
            })
            .collect::<Vec<_>>();

        tracing::info!(
            workers = workers.len(),
            max_pending = config.max_pending,
            preview = config.preview,
            "job manager started"
        );

        Self {
            store,
            assets,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            pending,
            max_pending: config.max_pending,
        }
    }

    /// Queues a job and returns its id without waiting for it to run.
    ///
    /// Empty seed tokens are replaced by the default seed. Fails with
    /// INVALID_DURATION for durations outside (0, 300] seconds and with
    /// QUEUE_FULL when too many jobs are already waiting.
    pub fn submit(
        &self,
        seed_tokens: Vec<String>,
        target_seconds: f32,
        seed: Option<u64>,
    ) -> Result<String> {
        validate_duration(target_seconds)?;

        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(DaemonError::new(
                ErrorCode::QueueFull,
                "Job manager is shutting down",
            ));
        };

        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_pending).then_some(n + 1)
            })
            .map_err(DaemonError::queue_full)?;

        let job = Job::new(seed_or_default(seed_tokens), target_seconds, seed);
        let job_id = job.job_id.clone();
        let seed = job.seed;

        if let Err(e) = self.store.insert(job) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(e);
        }
        if sender.send(WorkerMessage::JobAdded(job_id.clone())).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(DaemonError::new(
                ErrorCode::QueueFull,
                "No worker is available to run the job",
            ));
        }

        tracing::info!(job_id = %job_id, target_seconds, seed, "job queued");
        Ok(job_id)
    }

    /// Returns the current record of a job.
    pub fn status(&self, job_id: &str) -> Result<Arc<Job>> {
        self.store
            .get(job_id)
            .ok_or_else(|| DaemonError::job_not_found(job_id))
    }

    /// Returns the rendered bytes of an asset.
    pub fn fetch_asset(&self, asset_id: &str) -> Result<Vec<u8>> {
        self.assets.read_bytes(asset_id)
    }

    /// Number of jobs waiting for a worker.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stops accepting jobs and waits for the workers to exit.
    ///
    /// Jobs queued before the call are still run.
    pub fn shutdown(&self) {
        let Some(sender) = lock(&self.sender).take() else {
            return;
        };

        let mut workers = lock(&self.workers);
        for _ in workers.iter() {
            sender.send(WorkerMessage::Shutdown).ok();
        }
        drop(sender);

        for handle in workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
        tracing::info!("job manager stopped");
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn worker_loop(worker: Worker, receiver: Arc<Mutex<Receiver<WorkerMessage>>>, pending: Arc<AtomicUsize>) {
    loop {
        let message = lock(&*receiver).recv();
        match message {
            Ok(WorkerMessage::JobAdded(job_id)) => {
                pending.fetch_sub(1, Ordering::SeqCst);
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| worker.run(&job_id))) {
                    worker.recover(&job_id, panic_message(payload.as_ref()));
                }
            }
            Ok(WorkerMessage::Shutdown) | Err(_) => break,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs the passes of one job and publishes each transition.
struct Worker {
    store: Arc<dyn JobStore>,
    runner: Arc<dyn PassRunner>,
    preview: bool,
}

impl Worker {
    fn run(&self, job_id: &str) {
        let Some(queued) = self.store.get(job_id) else {
            tracing::warn!(job_id, "queued job is missing from the store");
            return;
        };
        let Some(mut current) = self.publish(queued.started()) else {
            return;
        };
        tracing::info!(job_id, "job started");

        if self.preview {
            match self.runner.run_pass(&current, PassKind::Preview) {
                Ok(asset) => match self.publish(current.preview_ready(&asset.asset_id)) {
                    Some(next) => current = next,
                    None => return,
                },
                Err(e) => return self.fail(&current, e),
            }
        }

        match self.runner.run_pass(&current, PassKind::Final) {
            Ok(asset) => {
                if self.publish(current.completed(&asset.asset_id)).is_some() {
                    tracing::info!(job_id, asset_id = %asset.asset_id, "job completed");
                }
            }
            Err(e) => self.fail(&current, e),
        }
    }

    /// Fails a job whose pass panicked so it never stays running.
    fn recover(&self, job_id: &str, reason: String) {
        tracing::error!(job_id, %reason, "pass panicked");
        if let Some(job) = self.store.get(job_id) {
            if job.status.is_active() {
                self.fail(&job, DaemonError::worker_panicked(reason));
            }
        }
    }

    fn fail(&self, job: &Job, error: DaemonError) {
        tracing::warn!(
            job_id = %job.job_id,
            status = %job.status,
            code = %error.code,
            error = %error.message,
            "job failed"
        );
        self.publish(job.failed(&error));
    }

    fn publish(&self, next: Result<Job>) -> Option<Arc<Job>> {
        match next.and_then(|job| self.store.replace(job)) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::error!(error = %e, "failed to publish job record");
                None
            }
        }
    }
}
