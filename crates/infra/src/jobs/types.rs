//! Core job types and policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use ami_core::DomainError;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued (or rescheduled after a failed attempt).
    Waiting,
    /// Claimed by a worker.
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^(attempt - 1)
    #[default]
    Exponential,
    /// Linear backoff: base * attempt
    Linear,
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first (1 = never retry).
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    /// A single attempt; a failing job goes straight to `failed`.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Delay before the retry that follows `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt - 1);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
        };
        delay.min(self.max_delay)
    }

    /// Check if another attempt is allowed after `attempt` attempts.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Failure raised by a job handler.
///
/// Never surfaces to the caller that enqueued the job; it is recorded on the
/// job record as its failure reason.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JobError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("no handler registered for job type `{0}`")]
    NoHandler(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Failed(String),
}

impl JobError {
    pub fn failed(msg: impl std::fmt::Display) -> Self {
        Self::Failed(msg.to_string())
    }
}

impl From<serde_json::Error> for JobError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidPayload(e.to_string())
    }
}

/// Illegal lifecycle transition on a job record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("job {id} is {status}; expected {expected}")]
pub struct JobTransitionError {
    pub id: JobId,
    pub status: JobStatus,
    pub expected: JobStatus,
}

/// A background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Queue the job was enqueued on
    pub queue: String,
    /// Job type, used to route to a handler
    pub kind: String,
    /// JSON payload
    pub payload: JsonValue,
    /// Current status
    pub status: JobStatus,
    /// 0..=100
    pub progress: u8,
    /// Handler result, set once on completion
    pub result: Option<JsonValue>,
    /// Set once on terminal failure
    pub failure_reason: Option<String>,
    /// Retry policy
    pub retry_policy: RetryPolicy,
    /// Number of attempts started so far
    pub attempt: u32,
    /// Per-store enqueue sequence (FIFO order)
    pub seq: u64,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job was last updated
    pub updated_at: DateTime<Utc>,
    /// Not claimable before this instant (retry backoff)
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
    /// Execution history
    pub history: Vec<JobAttemptRecord>,
}

/// Record of a job execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl Job {
    pub fn new(queue: impl Into<String>, kind: impl Into<String>, payload: JsonValue) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            queue: queue.into(),
            kind: kind.into(),
            payload,
            status: JobStatus::Waiting,
            progress: 0,
            result: None,
            failure_reason: None,
            retry_policy: RetryPolicy::default(),
            attempt: 0,
            seq: 0,
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            finished_at: None,
            history: Vec::new(),
        }
    }

    /// Set a custom retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Check if the job can be claimed at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Waiting && self.scheduled_at.is_none_or(|at| now >= at)
    }

    fn expect_status(&self, expected: JobStatus) -> Result<(), JobTransitionError> {
        if self.status != expected {
            return Err(JobTransitionError {
                id: self.id,
                status: self.status,
                expected,
            });
        }
        Ok(())
    }

    fn record_attempt(&mut self, started_at: DateTime<Utc>, now: DateTime<Utc>, error: Option<String>) {
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: error.is_none(),
            error,
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
        });
    }

    /// `waiting -> active`.
    pub fn mark_active(&mut self, now: DateTime<Utc>) -> Result<(), JobTransitionError> {
        self.expect_status(JobStatus::Waiting)?;
        self.status = JobStatus::Active;
        self.attempt += 1;
        self.scheduled_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// `active -> completed` with the handler result.
    pub fn mark_completed(
        &mut self,
        result: JsonValue,
        started_at: DateTime<Utc>,
    ) -> Result<(), JobTransitionError> {
        self.expect_status(JobStatus::Active)?;
        let now = Utc::now();
        self.record_attempt(started_at, now, None);
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.result = Some(result);
        self.finished_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `active -> waiting` (rescheduled with backoff) while the retry policy
    /// allows another attempt, otherwise `active -> failed`.
    pub fn mark_failed(
        &mut self,
        error: String,
        started_at: DateTime<Utc>,
    ) -> Result<(), JobTransitionError> {
        self.expect_status(JobStatus::Active)?;
        let now = Utc::now();
        self.record_attempt(started_at, now, Some(error.clone()));
        self.updated_at = now;

        if self.retry_policy.should_retry(self.attempt) {
            let delay = self.retry_policy.delay_for_attempt(self.attempt);
            self.scheduled_at = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
            self.status = JobStatus::Waiting;
        } else {
            self.status = JobStatus::Failed;
            self.failure_reason = Some(error);
            self.finished_at = Some(now);
        }
        Ok(())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.history.iter().rev().find_map(|r| r.error.as_deref())
    }
}

/// Returned by `enqueue`: enough to poll for status later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub id: JobId,
    pub queue: String,
}

/// Status as seen by a poller; `not_found` covers unknown and purged ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolledStatus {
    Waiting,
    Active,
    Completed,
    Failed,
    NotFound,
}

impl From<JobStatus> for PolledStatus {
    fn from(s: JobStatus) -> Self {
        match s {
            JobStatus::Waiting => PolledStatus::Waiting,
            JobStatus::Active => PolledStatus::Active,
            JobStatus::Completed => PolledStatus::Completed,
            JobStatus::Failed => PolledStatus::Failed,
        }
    }
}

/// Job status surface returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub status: PolledStatus,
    pub progress: u8,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
}

impl JobStatusView {
    pub fn not_found(id: JobId) -> Self {
        Self {
            id,
            status: PolledStatus::NotFound,
            progress: 0,
            result: None,
            error: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == PolledStatus::NotFound
    }
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            status: job.status.into(),
            progress: job.progress,
            result: job.result.clone(),
            error: job.failure_reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exponential_backoff_calculates_correctly() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::exponential(40, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(30));
    }

    #[test]
    fn linear_backoff_increases_linearly() {
        let policy = RetryPolicy {
            strategy: BackoffStrategy::Linear,
            ..RetryPolicy::fixed(5, Duration::from_millis(100))
        };
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..policy
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn default_policy_never_retries() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn job_lifecycle() {
        let mut job = Job::new("email", "send-email", json!({"to": "a@b.c"}));
        assert_eq!(job.status, JobStatus::Waiting);
        assert_eq!(job.attempt, 0);

        let started = Utc::now();
        job.mark_active(started).unwrap();
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.attempt, 1);

        job.mark_completed(json!({"ok": true}), started).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.history.len(), 1);
        assert!(job.history[0].success);
        assert!(job.failure_reason.is_none());
    }

    #[test]
    fn terminal_outcome_is_written_once() {
        let mut job = Job::new("email", "send-email", json!({}));
        job.mark_active(Utc::now()).unwrap();
        job.mark_failed("smtp down".into(), Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_reason.as_deref(), Some("smtp down"));

        assert!(job.mark_completed(json!({}), Utc::now()).is_err());
        assert!(job.result.is_none());
        assert!(job.mark_failed("again".into(), Utc::now()).is_err());
        assert_eq!(job.failure_reason.as_deref(), Some("smtp down"));
    }

    #[test]
    fn job_failure_and_retry() {
        let mut job = Job::new("q", "t", json!({}))
            .with_retry_policy(RetryPolicy::fixed(2, Duration::from_millis(10)));

        job.mark_active(Utc::now()).unwrap();
        job.mark_failed("error 1".to_string(), Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Waiting);
        assert!(job.scheduled_at.is_some());
        assert!(job.failure_reason.is_none());
        assert_eq!(job.last_error(), Some("error 1"));

        job.mark_active(Utc::now()).unwrap();
        job.mark_failed("error 2".to_string(), Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_reason.as_deref(), Some("error 2"));
        assert_eq!(job.history.len(), 2);
    }

    #[test]
    fn not_found_view_serializes_status() {
        let v = serde_json::to_value(JobStatusView::not_found(JobId::new())).unwrap();
        assert_eq!(v["status"], "not_found");
    }
}
