//! Background job system: named queues, typed handlers, fallback and retry.
//!
//! ## Design
//!
//! - Jobs live on named queues; FIFO within a queue, no ordering across queues
//! - One handler per job type; each queue gets its own worker pool
//! - A handler error completes the job with a degraded result when the type
//!   registered a fallback, otherwise the retry policy decides between
//!   rescheduling (with backoff) and `failed`
//! - Polling an unknown or purged job id yields a `not_found` status view
//!
//! ## Components
//!
//! - `Job`: job record with payload, status, progress and outcome
//! - `JobStore`: persistence for jobs (in-memory here)
//! - `JobExecutor`: runs claimed jobs through the `JobRegistry`
//! - `JobRuntime`: enqueue/status front door and worker pool lifecycle

pub mod executor;
pub mod runtime;
pub mod store;
pub mod types;

pub use executor::{
    ExecutorStats, JobContext, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobOutcome, JobRegistry,
};
pub use runtime::{JobRuntime, RuntimeConfig};
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{
    BackoffStrategy, Job, JobError, JobHandle, JobId, JobStatus, JobStatusView, PolledStatus, RetryPolicy,
};
