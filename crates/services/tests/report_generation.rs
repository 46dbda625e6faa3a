mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, json};

use ami_auth::Role;
use ami_core::DomainError;
use ami_infra::jobs::{
    InMemoryJobStore, Job, JobHandle, JobId, JobStats, JobStatus, JobStore, JobStoreError, PolledStatus,
};
use ami_reports::{NewReport, ReportStatus, ReportType};
use ami_services::ServiceError;
use ami_services::services::REPORT_TYPE_KEY;

use common::{configured_harness, harness, harness_with_job_store};

#[test]
fn completed_report_has_data_and_artifact() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");
    h.asset(&alice, "Press", Some(&project));
    h.asset(&alice, "Lathe", Some(&project));

    let requested = h
        .app
        .reports
        .generate(&alice, project.id, ReportType::ProjectSummary)
        .unwrap();
    assert_eq!(requested.report.status(), ReportStatus::Generating);
    assert!(h.app.reports.download(&alice, requested.report.id).is_err());
    assert_eq!(requested.report.name, "Plant A - project_summary Report");

    h.drain();

    let report = h.app.reports.find(&alice, requested.report.id).unwrap();
    assert_eq!(report.status(), ReportStatus::Completed);
    let path = report.file_path().expect("artifact path");
    assert!(Path::new(path).exists());
    assert!(report.file_url().unwrap().starts_with("/uploads/reports/project-summary-"));
    assert!(report.metadata.get("error").is_none());

    let data = h.app.reports.data(&alice, report.id).unwrap().unwrap();
    assert_eq!(data["summary"]["totalAssets"], 2);

    let download = h.app.reports.download(&alice, report.id).unwrap();
    assert_eq!(download.mime_type, "application/json");

    let status = h.app.reports.job_status(requested.job.job_id).unwrap();
    assert_eq!(status.status, PolledStatus::Completed);
}

#[test]
fn builder_failure_marks_report_failed_with_error() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);

    let mut metadata = Map::new();
    metadata.insert(REPORT_TYPE_KEY.to_string(), json!("project_summary"));
    let requested = h
        .app
        .reports
        .create(
            &alice,
            NewReport {
                name: "No project".to_string(),
                metadata,
                ..Default::default()
            },
        )
        .unwrap();

    h.drain();

    let report = h.app.reports.find(&alice, requested.report.id).unwrap();
    assert_eq!(report.status(), ReportStatus::Failed);
    assert!(report.metadata.get("error").and_then(|e| e.as_str()).is_some());
    assert!(report.file_path().is_none());
    assert!(report.data().is_none());

    let status = h.app.reports.job_status(requested.job.job_id).unwrap();
    assert_eq!(status.status, PolledStatus::Failed);
    assert!(status.error.is_some());
}

#[test]
fn customer_report_only_covers_own_assets() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let bob = h.user("bob@example.com", Role::CustomerUser);
    h.asset(&alice, "Press", None);
    h.asset(&bob, "Drill", None);
    h.asset(&bob, "Saw", None);

    let requested = h
        .app
        .reports
        .create(
            &alice,
            NewReport {
                name: "Everything".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    h.drain();

    let data = h.app.reports.data(&alice, requested.report.id).unwrap().unwrap();
    assert_eq!(data["summary"]["totalAssets"], 1);
}

#[test]
fn deleting_a_report_removes_its_artifact() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");
    let requested = h
        .app
        .reports
        .generate(&alice, project.id, ReportType::AssetAnalysis)
        .unwrap();
    h.drain();

    let report = h.app.reports.find(&alice, requested.report.id).unwrap();
    let path = report.file_path().unwrap().to_string();
    assert!(Path::new(&path).exists());

    h.app.reports.remove(&alice, report.id).unwrap();
    assert!(!Path::new(&path).exists());
    assert!(h.app.reports.find(&alice, report.id).unwrap_err().is_not_found());
}

#[test]
fn reports_on_foreign_projects_are_rejected() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let bob = h.user("bob@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");

    let err = h
        .app
        .reports
        .generate(&bob, project.id, ReportType::General)
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(h.app.runtime.stats("report-generation").unwrap().waiting, 0);
}

#[test]
fn download_waits_for_completion() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");
    let requested = h
        .app
        .reports
        .generate(&alice, project.id, ReportType::General)
        .unwrap();

    let err = h.app.reports.download(&alice, requested.report.id).unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::InvariantViolation(_))));
    assert!(err.to_string().contains("report is not ready for download"));
}

#[test]
fn foreign_report_download_is_not_found() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let bob = h.user("bob@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");
    let requested = h
        .app
        .reports
        .generate(&alice, project.id, ReportType::General)
        .unwrap();
    h.drain();

    let err = h.app.reports.download(&bob, requested.report.id).unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_forbidden());
}

#[test]
fn purged_and_unknown_jobs_poll_as_not_found() {
    let h = configured_harness(|config, _| config.jobs.retention = Duration::ZERO);
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");
    let requested = h
        .app
        .reports
        .generate(&alice, project.id, ReportType::General)
        .unwrap();
    h.drain();
    assert_eq!(
        h.app.reports.job_status(requested.job.job_id).unwrap().status,
        PolledStatus::Completed
    );

    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(h.app.runtime.purge_expired().unwrap(), 1);
    assert!(h.app.reports.job_status(requested.job.job_id).unwrap().is_not_found());
    assert!(h.app.reports.job_status(JobId::new()).unwrap().is_not_found());

    let report = h.app.reports.find(&alice, requested.report.id).unwrap();
    assert_eq!(report.status(), ReportStatus::Completed);
}

/// Refuses every enqueue; everything else goes to an in-memory store.
struct RejectingJobStore(InMemoryJobStore);

impl JobStore for RejectingJobStore {
    fn enqueue(&self, _job: Job) -> Result<JobHandle, JobStoreError> {
        Err(JobStoreError::Storage("queue unavailable".to_string()))
    }

    fn get(&self, queue: &str, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        self.0.get(queue, job_id)
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        self.0.update(job)
    }

    fn claim_next(&self, queue: &str, now: DateTime<Utc>) -> Result<Option<Job>, JobStoreError> {
        self.0.claim_next(queue, now)
    }

    fn set_progress(&self, queue: &str, job_id: JobId, progress: u8) -> Result<(), JobStoreError> {
        self.0.set_progress(queue, job_id, progress)
    }

    fn list_by_status(
        &self,
        queue: &str,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<Job>, JobStoreError> {
        self.0.list_by_status(queue, status, limit)
    }

    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobStoreError> {
        self.0.purge_finished_before(cutoff)
    }

    fn stats(&self, queue: &str) -> Result<JobStats, JobStoreError> {
        self.0.stats(queue)
    }
}

#[test]
fn failed_enqueue_marks_report_failed() {
    let h = harness_with_job_store(Arc::new(RejectingJobStore(InMemoryJobStore::new())));
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");

    let err = h
        .app
        .reports
        .generate(&alice, project.id, ReportType::General)
        .unwrap_err();
    assert!(err.to_string().contains("queue unavailable"));

    let reports = h.app.reports.list(&alice, Default::default(), Default::default()).unwrap();
    assert_eq!(reports.total, 1);
    let report = &reports.items[0];
    assert_eq!(report.status(), ReportStatus::Failed);
    assert!(report.failure_reason().unwrap().contains("failed to enqueue report generation"));
}

#[test]
fn refused_completion_removes_the_artifact() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");
    let requested = h
        .app
        .reports
        .generate(&alice, project.id, ReportType::General)
        .unwrap();

    // The row reaches a terminal state before the worker gets to it.
    h.app
        .stores
        .reports
        .update_unscoped(&requested.report.id, |r| r.fail("cancelled", Utc::now()))
        .unwrap();
    h.drain();

    let report = h.app.reports.find(&alice, requested.report.id).unwrap();
    assert_eq!(report.failure_reason(), Some("cancelled"));
    assert!(report.file_path().is_none());
    let dir = h.uploads.path().join("reports");
    let leftovers = std::fs::read_dir(&dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);

    let status = h.app.reports.job_status(requested.job.job_id).unwrap();
    assert_eq!(status.status, PolledStatus::Failed);
}
