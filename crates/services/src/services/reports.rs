use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{info, warn};

use ami_auth::Actor;
use ami_core::{ExpectedVersion, Page, PageRequest, ProjectId, ReportId};
use ami_infra::ArtifactStore;
use ami_infra::jobs::{JobId, JobRuntime, JobStatusView};
use ami_reports::{NewReport, Report, ReportDownload, ReportPatch, ReportStats, ReportStatus, ReportType};

use crate::error::ServiceResult;
use crate::jobs::{GenerateReportJob, JobAccepted, kind, queue};
use crate::stores::Stores;

/// Metadata key that selects the builder for manually requested reports.
pub const REPORT_TYPE_KEY: &str = "reportType";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    pub project_id: Option<ProjectId>,
    pub status: Option<ReportStatus>,
}

/// A report in `generating` plus the job that will finish it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequested {
    pub report: Report,
    pub job: JobAccepted,
}

#[derive(Clone)]
pub struct ReportsService {
    stores: Stores,
    runtime: Arc<JobRuntime>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl ReportsService {
    pub fn new(stores: Stores, runtime: Arc<JobRuntime>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            stores,
            runtime,
            artifacts,
        }
    }

    /// Stores the report in `generating` and enqueues its generation. The
    /// builder is chosen by `metadata.reportType` (general when absent).
    pub fn create(&self, actor: &Actor, input: NewReport) -> ServiceResult<ReportRequested> {
        if let Some(id) = input.project_id {
            self.stores.projects.find(actor, &id)?;
        }
        let report_type = input
            .metadata
            .get(REPORT_TYPE_KEY)
            .and_then(JsonValue::as_str)
            .map(ReportType::from_name)
            .unwrap_or_default();
        let report = Report::request(input, actor.id, Utc::now())?;
        self.enqueue(actor, report, report_type)
    }

    /// Report of `report_type` over one visible project.
    pub fn generate(
        &self,
        actor: &Actor,
        project_id: ProjectId,
        report_type: ReportType,
    ) -> ServiceResult<ReportRequested> {
        let project = self.stores.projects.find(actor, &project_id)?;
        let type_name = report_type.as_str();

        let mut metadata = Map::new();
        metadata.insert(REPORT_TYPE_KEY.to_string(), type_name.into());
        metadata.insert("projectName".to_string(), project.name.clone().into());
        let input = NewReport {
            name: format!("{} - {type_name} Report", project.name),
            description: Some(format!("Generated {type_name} report for project {}", project.name)),
            metadata,
            project_id: Some(project.id),
        };
        let report = Report::request(input, actor.id, Utc::now())?;
        self.enqueue(actor, report, report_type)
    }

    fn enqueue(&self, actor: &Actor, report: Report, report_type: ReportType) -> ServiceResult<ReportRequested> {
        let report = self.stores.reports.insert(report)?;
        let payload = GenerateReportJob {
            report_id: report.id,
            project_id: report.project_id,
            report_type,
            user_id: actor.id,
        };
        let handle = match self
            .runtime
            .enqueue_json(queue::REPORT_GENERATION, kind::GENERATE_REPORT, &payload)
        {
            Ok(handle) => handle,
            Err(e) => {
                // No job will ever finish this row, so it must not stay generating.
                let reason = format!("failed to enqueue report generation: {e}");
                if let Err(mark) = self.stores.reports.update_unscoped(&report.id, |r| r.fail(reason.clone(), Utc::now())) {
                    warn!(report_id = %report.id, error = %mark, "failed to mark unqueued report as failed");
                }
                warn!(report_id = %report.id, error = %e, "report generation could not be enqueued");
                return Err(e.into());
            }
        };
        info!(report_id = %report.id, job_id = %handle.id, report_type = report_type.as_str(), "report generation enqueued");
        Ok(ReportRequested {
            report,
            job: JobAccepted::new(handle, "Report generation started"),
        })
    }

    pub fn find(&self, actor: &Actor, id: ReportId) -> ServiceResult<Report> {
        Ok(self.stores.reports.find(actor, &id)?)
    }

    pub fn list(&self, actor: &Actor, page: PageRequest, filter: ReportFilter) -> ServiceResult<Page<Report>> {
        Ok(self.stores.reports.list(actor, page, &|r| {
            filter.project_id.is_none_or(|p| r.project_id == Some(p))
                && filter.status.is_none_or(|s| r.status() == s)
        })?)
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: ReportId,
        patch: ReportPatch,
        expected: ExpectedVersion,
    ) -> ServiceResult<Report> {
        let now = Utc::now();
        Ok(self
            .stores
            .reports
            .update(actor, &id, expected, |r| r.apply_patch(patch.clone(), now))?)
    }

    /// Deletes the report; its artifact file is removed on a best-effort basis.
    pub fn remove(&self, actor: &Actor, id: ReportId) -> ServiceResult<()> {
        let removed = self.stores.reports.delete(actor, &id)?;
        if let Some(path) = removed.file_path() {
            if let Err(e) = self.artifacts.remove(Path::new(path)) {
                warn!(report_id = %id, error = %e, "failed to delete report artifact");
            }
        }
        info!(report_id = %id, "report deleted");
        Ok(())
    }

    /// Generated payload; `None` until the report completes.
    pub fn data(&self, actor: &Actor, id: ReportId) -> ServiceResult<Option<JsonValue>> {
        Ok(self.stores.reports.find(actor, &id)?.data().cloned())
    }

    pub fn download(&self, actor: &Actor, id: ReportId) -> ServiceResult<ReportDownload> {
        Ok(self.stores.reports.find(actor, &id)?.download()?)
    }

    pub fn stats(&self, actor: &Actor) -> ServiceResult<ReportStats> {
        let visible = self.stores.reports.visible(actor, &|_| true)?;
        Ok(ReportStats::collect(&visible))
    }

    pub fn job_status(&self, job_id: JobId) -> ServiceResult<JobStatusView> {
        Ok(self.runtime.status(queue::REPORT_GENERATION, job_id)?)
    }
}
