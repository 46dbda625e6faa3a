//! Job executor: handler registry, fallback and retry handling, worker pools.

use std::collections::{BTreeSet, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, error, info, warn};

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobError};

/// Job handler function type.
pub type JobHandler = Arc<dyn Fn(&JobContext<'_>) -> Result<JsonValue, JobError> + Send + Sync>;

/// Computes a degraded result when the handler fails.
pub type JobFallback = Arc<dyn Fn(&Job, &JobError) -> JsonValue + Send + Sync>;

/// What a handler sees while it runs.
pub struct JobContext<'a> {
    job: &'a Job,
    store: &'a dyn JobStore,
}

impl<'a> JobContext<'a> {
    pub fn new(job: &'a Job, store: &'a dyn JobStore) -> Self {
        Self { job, store }
    }

    pub fn job(&self) -> &Job {
        self.job
    }

    /// Decode the payload into the handler's input type.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, JobError> {
        Ok(serde_json::from_value(self.job.payload.clone())?)
    }

    /// Report progress (0..=100). Failures to record progress are logged only.
    pub fn progress(&self, percent: u8) {
        if let Err(e) = self.store.set_progress(&self.job.queue, self.job.id, percent) {
            warn!(job_id = %self.job.id, error = %e, "failed to record job progress");
        }
    }
}

struct Registration {
    queue: String,
    handler: JobHandler,
    fallback: Option<JobFallback>,
}

/// Handlers keyed by job type. Each job type belongs to exactly one queue.
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<String, Registration>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("JobRegistry").field("kinds", &kinds).finish()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; a failing job is retried per its policy, then failed.
    pub fn register<F>(&mut self, queue: impl Into<String>, kind: impl Into<String>, handler: F)
    where
        F: Fn(&JobContext<'_>) -> Result<JsonValue, JobError> + Send + Sync + 'static,
    {
        self.handlers.insert(
            kind.into(),
            Registration {
                queue: queue.into(),
                handler: Arc::new(handler),
                fallback: None,
            },
        );
    }

    /// Register a handler whose failures complete the job with the fallback's
    /// result (and the error embedded in it) instead of failing it.
    pub fn register_with_fallback<F, B>(
        &mut self,
        queue: impl Into<String>,
        kind: impl Into<String>,
        handler: F,
        fallback: B,
    ) where
        F: Fn(&JobContext<'_>) -> Result<JsonValue, JobError> + Send + Sync + 'static,
        B: Fn(&Job, &JobError) -> JsonValue + Send + Sync + 'static,
    {
        self.handlers.insert(
            kind.into(),
            Registration {
                queue: queue.into(),
                handler: Arc::new(handler),
                fallback: Some(Arc::new(fallback)),
            },
        );
    }

    /// Queues that have at least one handler.
    pub fn queues(&self) -> BTreeSet<String> {
        self.handlers.values().map(|r| r.queue.clone()).collect()
    }

    pub fn handles(&self, queue: &str, kind: &str) -> bool {
        self.handlers.get(kind).is_some_and(|r| r.queue == queue)
    }
}

/// How a single execution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed,
    /// Handler failed; the fallback result was recorded as a completion.
    Degraded(JobError),
    /// Handler failed; the job went back to `waiting` for another attempt.
    Rescheduled(JobError),
    Failed(JobError),
}

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// Queue this pool consumes
    pub queue: String,
    /// Number of worker threads
    pub concurrency: usize,
    /// How often an idle worker polls for new jobs
    pub poll_interval: Duration,
}

impl JobExecutorConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            concurrency: 1,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_degraded: u64,
    pub jobs_rescheduled: u64,
    pub jobs_failed: u64,
    pub current_running: usize,
    pub uptime_secs: u64,
}

impl ExecutorStats {
    fn record(&mut self, outcome: &JobOutcome) {
        self.jobs_processed += 1;
        match outcome {
            JobOutcome::Completed => self.jobs_succeeded += 1,
            JobOutcome::Degraded(_) => self.jobs_degraded += 1,
            JobOutcome::Rescheduled(_) => self.jobs_rescheduled += 1,
            JobOutcome::Failed(_) => self.jobs_failed += 1,
        }
    }
}

struct Worker {
    shutdown: mpsc::Sender<()>,
    join: thread::JoinHandle<()>,
}

/// Handle to control a running worker pool.
pub struct JobExecutorHandle {
    queue: String,
    workers: Vec<Worker>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl std::fmt::Debug for JobExecutorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutorHandle")
            .field("queue", &self.queue)
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl JobExecutorHandle {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Request graceful shutdown. Jobs already claimed run to completion.
    pub fn shutdown(self) {
        for w in &self.workers {
            let _ = w.shutdown.send(());
        }
        for w in self.workers {
            let _ = w.join.join();
        }
        info!(queue = %self.queue, "worker pool stopped");
    }

    /// Get current pool statistics.
    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Runs claimed jobs through their registered handlers.
pub struct JobExecutor<S: JobStore> {
    store: S,
    registry: JobRegistry,
}

impl<S: JobStore + 'static> JobExecutor<S> {
    pub fn new(store: S, registry: JobRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Execute a claimed (active) job and persist its outcome.
    pub fn execute_one(&self, job: &mut Job) -> Result<JobOutcome, JobStoreError> {
        let started = Utc::now();

        let outcome = match self.registry.handlers.get(&job.kind) {
            Some(reg) if reg.queue == job.queue => {
                let ctx = JobContext::new(job, &self.store);
                let result = catch_unwind(AssertUnwindSafe(|| (reg.handler)(&ctx)))
                    .unwrap_or_else(|_| Err(JobError::failed("job handler panicked")));

                match (result, &reg.fallback) {
                    (Ok(value), _) => {
                        complete(job, value, started)?;
                        JobOutcome::Completed
                    }
                    (Err(err), Some(fallback)) => {
                        let degraded = annotate(fallback(job, &err), &err);
                        complete(job, degraded, started)?;
                        JobOutcome::Degraded(err)
                    }
                    (Err(err), None) => fail(job, err, started)?,
                }
            }
            _ => {
                let err = JobError::NoHandler(job.kind.clone());
                fail(job, err, started)?
            }
        };

        self.store.update(job)?;
        Ok(outcome)
    }

    /// Claim and execute jobs on `queue` until none is ready. Returns the
    /// number of jobs executed.
    pub fn drain(&self, queue: &str) -> Result<usize, JobStoreError> {
        let mut executed = 0;
        while let Some(mut job) = self.store.claim_next(queue, Utc::now())? {
            let outcome = self.execute_one(&mut job)?;
            log_outcome(&job, &outcome);
            executed += 1;
        }
        Ok(executed)
    }
}

impl<S: JobStore + 'static> JobExecutor<S> {
    /// Spawn a pool of worker threads consuming `config.queue`.
    pub fn spawn(self: &Arc<Self>, config: JobExecutorConfig) -> std::io::Result<JobExecutorHandle> {
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));
        let mut workers = Vec::with_capacity(config.concurrency);

        for n in 0..config.concurrency.max(1) {
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
            let executor = Arc::clone(self);
            let stats = Arc::clone(&stats);
            let config = config.clone();

            let join = thread::Builder::new()
                .name(format!("{}-worker-{n}", config.queue))
                .spawn(move || worker_loop(&executor, &config, &shutdown_rx, &stats))?;

            workers.push(Worker {
                shutdown: shutdown_tx,
                join,
            });
        }

        info!(queue = %config.queue, workers = workers.len(), "worker pool started");
        Ok(JobExecutorHandle {
            queue: config.queue,
            workers,
            stats,
        })
    }
}

fn complete(job: &mut Job, result: JsonValue, started: chrono::DateTime<Utc>) -> Result<(), JobStoreError> {
    job.mark_completed(result, started)
        .map_err(|e| JobStoreError::Storage(e.to_string()))
}

fn fail(job: &mut Job, err: JobError, started: chrono::DateTime<Utc>) -> Result<JobOutcome, JobStoreError> {
    job.mark_failed(err.to_string(), started)
        .map_err(|e| JobStoreError::Storage(e.to_string()))?;
    Ok(if job.status.is_terminal() {
        JobOutcome::Failed(err)
    } else {
        JobOutcome::Rescheduled(err)
    })
}

/// Embed the triggering error into a fallback result.
fn annotate(result: JsonValue, err: &JobError) -> JsonValue {
    match result {
        JsonValue::Object(mut map) => {
            map.insert("error".to_string(), JsonValue::String(err.to_string()));
            JsonValue::Object(map)
        }
        other => json!({ "result": other, "error": err.to_string() }),
    }
}

fn log_outcome(job: &Job, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Completed => debug!(job_id = %job.id, queue = %job.queue, kind = %job.kind, "job completed"),
        JobOutcome::Degraded(e) => {
            warn!(job_id = %job.id, queue = %job.queue, kind = %job.kind, error = %e, "job completed with fallback result")
        }
        JobOutcome::Rescheduled(e) => {
            warn!(job_id = %job.id, queue = %job.queue, kind = %job.kind, attempt = job.attempt, error = %e, "job attempt failed; rescheduled")
        }
        JobOutcome::Failed(e) => {
            error!(job_id = %job.id, queue = %job.queue, kind = %job.kind, attempt = job.attempt, error = %e, "job failed")
        }
    }
}

/// Wait for the next poll; `true` means shut down.
fn idle(shutdown_rx: &mpsc::Receiver<()>, poll_interval: Duration) -> bool {
    !matches!(shutdown_rx.recv_timeout(poll_interval), Err(RecvTimeoutError::Timeout))
}

fn worker_loop<S: JobStore + 'static>(
    executor: &JobExecutor<S>,
    config: &JobExecutorConfig,
    shutdown_rx: &mpsc::Receiver<()>,
    stats: &Mutex<ExecutorStats>,
) {
    debug!(queue = %config.queue, "worker started");
    let start_time = Instant::now();

    loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        if let Ok(mut s) = stats.lock() {
            s.uptime_secs = start_time.elapsed().as_secs();
        }

        match executor.store.claim_next(&config.queue, Utc::now()) {
            Ok(Some(mut job)) => {
                debug!(queue = %config.queue, job_id = %job.id, kind = %job.kind, attempt = job.attempt, "claimed job");

                if let Ok(mut s) = stats.lock() {
                    s.current_running += 1;
                }

                let result = executor.execute_one(&mut job);

                if let Ok(mut s) = stats.lock() {
                    s.current_running = s.current_running.saturating_sub(1);
                    if let Ok(outcome) = &result {
                        s.record(outcome);
                    }
                }

                match result {
                    Ok(outcome) => log_outcome(&job, &outcome),
                    Err(e) => error!(queue = %config.queue, job_id = %job.id, error = %e, "failed to persist job outcome"),
                }
            }
            Ok(None) => {
                if idle(shutdown_rx, config.poll_interval) {
                    break;
                }
            }
            Err(e) => {
                error!(queue = %config.queue, error = %e, "failed to claim job");
                if idle(shutdown_rx, config.poll_interval) {
                    break;
                }
            }
        }
    }

    debug!(queue = %config.queue, "worker stopped");
}
