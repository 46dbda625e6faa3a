//! Process-wide job runtime: the queue front door plus its worker pools.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info};

use super::executor::{JobExecutor, JobExecutorConfig, JobExecutorHandle, JobRegistry};
use super::store::{JobStats, JobStore, JobStoreError};
use super::types::{Job, JobHandle, JobId, JobStatus, JobStatusView, RetryPolicy};

/// Runtime tuning.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Workers per queue unless overridden in `queue_concurrency`.
    pub concurrency: usize,
    pub queue_concurrency: HashMap<String, usize>,
    pub poll_interval: Duration,
    /// Terminal jobs older than this poll as `not_found`.
    pub retention: Duration,
    pub purge_interval: Duration,
    /// Policy given to every enqueued job.
    pub retry_policy: RetryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            queue_concurrency: HashMap::new(),
            poll_interval: Duration::from_millis(250),
            retention: Duration::from_secs(24 * 60 * 60),
            purge_interval: Duration::from_secs(60),
            retry_policy: RetryPolicy::no_retry(),
        }
    }
}

impl RuntimeConfig {
    pub fn concurrency_for(&self, queue: &str) -> usize {
        self.queue_concurrency
            .get(queue)
            .copied()
            .unwrap_or(self.concurrency)
            .max(1)
    }
}

struct Janitor {
    shutdown: mpsc::Sender<()>,
    join: thread::JoinHandle<()>,
}

#[derive(Default)]
struct Running {
    pools: Vec<JobExecutorHandle>,
    janitor: Option<Janitor>,
}

/// Job queue runtime shared (via `Arc`) by services that enqueue and by the
/// process that hosts the workers.
pub struct JobRuntime {
    executor: Arc<JobExecutor<Arc<dyn JobStore>>>,
    config: RuntimeConfig,
    running: Mutex<Running>,
}

impl std::fmt::Debug for JobRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRuntime")
            .field("registry", self.executor.registry())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JobRuntime {
    pub fn new(store: Arc<dyn JobStore>, registry: JobRegistry, config: RuntimeConfig) -> Self {
        Self {
            executor: Arc::new(JobExecutor::new(store, registry)),
            config,
            running: Mutex::new(Running::default()),
        }
    }

    fn store(&self) -> &Arc<dyn JobStore> {
        self.executor.store()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Add a job to `queue`. Never waits for a worker.
    pub fn enqueue(&self, queue: &str, kind: &str, payload: JsonValue) -> Result<JobHandle, JobStoreError> {
        let job = Job::new(queue, kind, payload).with_retry_policy(self.config.retry_policy.clone());
        let handle = self.store().enqueue(job)?;
        debug!(job_id = %handle.id, queue = %queue, kind = %kind, "job enqueued");
        Ok(handle)
    }

    /// Serialize `payload` and enqueue it.
    pub fn enqueue_json<P: Serialize>(
        &self,
        queue: &str,
        kind: &str,
        payload: &P,
    ) -> Result<JobHandle, JobStoreError> {
        let payload =
            serde_json::to_value(payload).map_err(|e| JobStoreError::Storage(format!("unserializable payload: {e}")))?;
        self.enqueue(queue, kind, payload)
    }

    /// Poll a job. Unknown, purged, or other-queue ids yield a `not_found` view.
    pub fn status(&self, queue: &str, id: JobId) -> Result<JobStatusView, JobStoreError> {
        Ok(self
            .store()
            .get(queue, id)?
            .map(|job| JobStatusView::from(&job))
            .unwrap_or_else(|| JobStatusView::not_found(id)))
    }

    pub fn job(&self, queue: &str, id: JobId) -> Result<Option<Job>, JobStoreError> {
        self.store().get(queue, id)
    }

    pub fn list(&self, queue: &str, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        self.store().list_by_status(queue, status, limit)
    }

    pub fn stats(&self, queue: &str) -> Result<JobStats, JobStoreError> {
        self.store().stats(queue)
    }

    /// Remove terminal jobs past the retention window.
    pub fn purge_expired(&self) -> Result<usize, JobStoreError> {
        let retention = chrono::Duration::from_std(self.config.retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(retention).unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        self.store().purge_finished_before(cutoff)
    }

    /// Execute every ready job on every registered queue on the calling
    /// thread, until all queues are idle.
    pub fn run_pending(&self) -> Result<usize, JobStoreError> {
        let queues = self.executor.registry().queues();
        let mut total = 0;
        loop {
            let mut round = 0;
            for queue in &queues {
                round += self.executor.drain(queue)?;
            }
            if round == 0 {
                return Ok(total);
            }
            total += round;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_ok_and(|r| !r.pools.is_empty())
    }

    /// Start one worker pool per registered queue, plus the retention
    /// janitor. Calling `start` on a running runtime does nothing.
    pub fn start(&self) -> std::io::Result<()> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| std::io::Error::other("job runtime state poisoned"))?;
        if !running.pools.is_empty() {
            return Ok(());
        }

        for queue in self.executor.registry().queues() {
            let config = JobExecutorConfig::new(queue.clone())
                .with_concurrency(self.config.concurrency_for(&queue))
                .with_poll_interval(self.config.poll_interval);
            running.pools.push(self.executor.spawn(config)?);
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let store = Arc::clone(self.store());
        let retention = self.config.retention;
        let interval = self.config.purge_interval;
        let join = thread::Builder::new()
            .name("job-janitor".to_string())
            .spawn(move || {
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                    let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
                    let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
                        continue;
                    };
                    match store.purge_finished_before(cutoff) {
                        Ok(0) => {}
                        Ok(n) => debug!(purged = n, "expired jobs purged"),
                        Err(e) => error!(error = %e, "failed to purge expired jobs"),
                    }
                }
            })?;
        running.janitor = Some(Janitor {
            shutdown: shutdown_tx,
            join,
        });

        info!(queues = running.pools.len(), "job runtime started");
        Ok(())
    }

    /// Stop all worker pools, letting in-flight jobs finish.
    pub fn shutdown(&self) {
        let Ok(mut running) = self.running.lock() else {
            return;
        };
        let pools = std::mem::take(&mut running.pools);
        let janitor = running.janitor.take();
        drop(running);

        let stopped = pools.len();
        for pool in pools {
            pool.shutdown();
        }
        if let Some(j) = janitor {
            let _ = j.shutdown.send(());
            let _ = j.join.join();
        }
        if stopped > 0 {
            info!(queues = stopped, "job runtime stopped");
        }
    }
}

impl Drop for JobRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
