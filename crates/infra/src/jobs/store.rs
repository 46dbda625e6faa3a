//! Job storage implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::types::{Job, JobHandle, JobId, JobStatus};

/// Job store abstraction.
///
/// Queues are namespaces inside one store: a job is only visible through the
/// queue it was enqueued on.
pub trait JobStore: Send + Sync {
    /// Enqueue a new job, assigning its FIFO sequence number.
    fn enqueue(&self, job: Job) -> Result<JobHandle, JobStoreError>;

    /// Get a job by queue and ID.
    fn get(&self, queue: &str, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Replace a stored job.
    fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Atomically claim the oldest ready job on `queue` (status -> active).
    fn claim_next(&self, queue: &str, now: DateTime<Utc>) -> Result<Option<Job>, JobStoreError>;

    /// Record handler progress on an active job.
    fn set_progress(&self, queue: &str, job_id: JobId, progress: u8) -> Result<(), JobStoreError>;

    /// List jobs on a queue, optionally filtered by status, in FIFO order.
    fn list_by_status(
        &self,
        queue: &str,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<Job>, JobStoreError>;

    /// Drop terminal jobs that finished before `cutoff`. Returns how many were removed.
    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobStoreError>;

    /// Get job statistics for a queue.
    fn stats(&self, queue: &str) -> Result<JobStats, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    seq: AtomicU64,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .read()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".into()))
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, mut job: Job) -> Result<JobHandle, JobStoreError> {
        let mut jobs = self.write()?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        job.seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let handle = JobHandle {
            id: job.id,
            queue: job.queue.clone(),
        };
        jobs.insert(job.id, job);
        Ok(handle)
    }

    fn get(&self, queue: &str, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.read()?;
        Ok(jobs.get(&job_id).filter(|j| j.queue == queue).cloned())
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.write()?;
        match jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(JobStoreError::NotFound(job.id)),
        }
    }

    fn claim_next(&self, queue: &str, now: DateTime<Utc>) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.write()?;

        let next = jobs
            .values()
            .filter(|j| j.queue == queue && j.is_ready(now))
            .min_by_key(|j| j.seq)
            .map(|j| j.id);

        let Some(job_id) = next else {
            return Ok(None);
        };
        let Some(job) = jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        job.mark_active(now)
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;
        Ok(Some(job.clone()))
    }

    fn set_progress(&self, queue: &str, job_id: JobId, progress: u8) -> Result<(), JobStoreError> {
        let mut jobs = self.write()?;
        let job = jobs
            .get_mut(&job_id)
            .filter(|j| j.queue == queue)
            .ok_or(JobStoreError::NotFound(job_id))?;
        if job.status == JobStatus::Active {
            job.progress = progress.min(100);
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    fn list_by_status(
        &self,
        queue: &str,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.read()?;
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| j.queue == queue && status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();

        result.sort_by_key(|j| j.seq);
        result.truncate(limit);
        Ok(result)
    }

    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobStoreError> {
        let mut jobs = self.write()?;
        let before = jobs.len();
        jobs.retain(|_, j| !(j.status.is_terminal() && j.finished_at.is_some_and(|at| at < cutoff)));
        Ok(before - jobs.len())
    }

    fn stats(&self, queue: &str) -> Result<JobStats, JobStoreError> {
        let jobs = self.read()?;
        let mut stats = JobStats::default();

        for job in jobs.values().filter(|j| j.queue == queue) {
            match job.status {
                JobStatus::Waiting => stats.waiting += 1,
                JobStatus::Active => stats.active += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }

        Ok(stats)
    }
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn enqueue(&self, job: Job) -> Result<JobHandle, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, queue: &str, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(queue, job_id)
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).update(job)
    }

    fn claim_next(&self, queue: &str, now: DateTime<Utc>) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next(queue, now)
    }

    fn set_progress(&self, queue: &str, job_id: JobId, progress: u8) -> Result<(), JobStoreError> {
        (**self).set_progress(queue, job_id, progress)
    }

    fn list_by_status(
        &self,
        queue: &str,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<Job>, JobStoreError> {
        (**self).list_by_status(queue, status, limit)
    }

    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobStoreError> {
        (**self).purge_finished_before(cutoff)
    }

    fn stats(&self, queue: &str) -> Result<JobStats, JobStoreError> {
        (**self).stats(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn enqueue_and_claim() {
        let store = InMemoryJobStore::new();

        let handle = store.enqueue(Job::new("email", "send-email", json!({}))).unwrap();
        assert_eq!(handle.queue, "email");

        let claimed = store.claim_next("email", Utc::now()).unwrap().unwrap();
        assert_eq!(claimed.id, handle.id);
        assert_eq!(claimed.status, JobStatus::Active);
        assert_eq!(claimed.attempt, 1);

        // No more jobs
        assert!(store.claim_next("email", Utc::now()).unwrap().is_none());
    }

    #[test]
    fn claims_in_fifo_order_per_queue() {
        let store = InMemoryJobStore::new();
        let a = store.enqueue(Job::new("q", "t", json!({"n": 1}))).unwrap();
        let _other = store.enqueue(Job::new("other", "t", json!({}))).unwrap();
        let b = store.enqueue(Job::new("q", "t", json!({"n": 2}))).unwrap();

        let now = Utc::now();
        assert_eq!(store.claim_next("q", now).unwrap().unwrap().id, a.id);
        assert_eq!(store.claim_next("q", now).unwrap().unwrap().id, b.id);
        assert!(store.claim_next("q", now).unwrap().is_none());
    }

    #[test]
    fn queue_isolation() {
        let store = InMemoryJobStore::new();
        let handle = store.enqueue(Job::new("ai-processing", "t", json!({}))).unwrap();

        assert!(store.get("email", handle.id).unwrap().is_none());
        assert!(store.claim_next("email", Utc::now()).unwrap().is_none());
        assert!(store.get("ai-processing", handle.id).unwrap().is_some());
    }

    #[test]
    fn rescheduled_jobs_wait_for_backoff() {
        let store = InMemoryJobStore::new();
        let mut job = Job::new("q", "t", json!({}));
        job.scheduled_at = Some(Utc::now() + Duration::seconds(60));
        store.enqueue(job).unwrap();

        assert!(store.claim_next("q", Utc::now()).unwrap().is_none());
        let later = Utc::now() + Duration::seconds(61);
        assert!(store.claim_next("q", later).unwrap().is_some());
    }

    #[test]
    fn purge_only_removes_old_terminal_jobs() {
        let store = InMemoryJobStore::new();
        store.enqueue(Job::new("q", "t", json!({}))).unwrap();
        store.enqueue(Job::new("q", "t", json!({}))).unwrap();

        let mut done = store.claim_next("q", Utc::now()).unwrap().unwrap();
        done.mark_completed(json!({}), Utc::now()).unwrap();
        store.update(&done).unwrap();

        assert_eq!(store.purge_finished_before(Utc::now() - Duration::hours(1)).unwrap(), 0);
        assert_eq!(store.purge_finished_before(Utc::now() + Duration::seconds(1)).unwrap(), 1);
        assert!(store.get("q", done.id).unwrap().is_none());
        assert_eq!(store.stats("q").unwrap().waiting, 1);
    }

    #[test]
    fn stats_tracking() {
        let store = InMemoryJobStore::new();

        for i in 0..5 {
            store.enqueue(Job::new("q", "t", json!({"i": i}))).unwrap();
        }

        let stats = store.stats("q").unwrap();
        assert_eq!(stats.waiting, 5);

        store.claim_next("q", Utc::now()).unwrap();
        store.claim_next("q", Utc::now()).unwrap();

        let stats = store.stats("q").unwrap();
        assert_eq!(stats.waiting, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(store.stats("other").unwrap(), JobStats::default());
    }

    #[test]
    fn progress_is_clamped_and_only_tracked_while_active() {
        let store = InMemoryJobStore::new();
        let h = store.enqueue(Job::new("q", "t", json!({}))).unwrap();
        store.set_progress("q", h.id, 50).unwrap();
        assert_eq!(store.get("q", h.id).unwrap().unwrap().progress, 0);

        store.claim_next("q", Utc::now()).unwrap();
        store.set_progress("q", h.id, 250).unwrap();
        assert_eq!(store.get("q", h.id).unwrap().unwrap().progress, 100);
    }
}
