//! `report-generation` queue: build the payload, write the artifact, and
//! move the report to exactly one terminal state.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use tracing::{error, info, warn};

use ami_auth::Actor;
use ami_core::{DomainError, ProjectId};
use ami_infra::ArtifactStore;
use ami_infra::jobs::{JobContext, JobError, JobRegistry};
use ami_reports::{BuilderRegistry, Report, ReportArtifact, ReportInput, ReportType};

use crate::jobs::{GenerateReportJob, kind, queue};
use crate::stores::Stores;

const ARTIFACT_CATEGORY: &str = "reports";

pub fn register(
    registry: &mut JobRegistry,
    stores: &Stores,
    artifacts: &Arc<dyn ArtifactStore>,
    builders: &BuilderRegistry,
) {
    let generator = ReportGenerator {
        stores: stores.clone(),
        artifacts: artifacts.clone(),
        builders: builders.clone(),
    };
    registry.register(queue::REPORT_GENERATION, kind::GENERATE_REPORT, move |ctx| generator.run(ctx));
}

struct ReportGenerator {
    stores: Stores,
    artifacts: Arc<dyn ArtifactStore>,
    builders: BuilderRegistry,
}

impl ReportGenerator {
    fn run(&self, ctx: &JobContext<'_>) -> Result<JsonValue, JobError> {
        let job: GenerateReportJob = ctx.payload()?;
        let report = self
            .stores
            .reports
            .get(&job.report_id)?
            .ok_or_else(|| JobError::failed(format!("report {} not found", job.report_id)))?;

        match self.generate(ctx, &job, &report) {
            Ok(artifact) => {
                info!(report_id = %report.id, path = %artifact.path, "report generated");
                Ok(json!({
                    "reportId": report.id,
                    "status": "completed",
                    "fileUrl": artifact.url,
                }))
            }
            Err(err) => {
                let now = Utc::now();
                if let Err(e) = self
                    .stores
                    .reports
                    .update_unscoped(&report.id, |r| r.fail(err.to_string(), now))
                {
                    error!(report_id = %report.id, error = %e, "failed to mark report failed");
                }
                error!(report_id = %report.id, error = %err, "report generation failed");
                Err(err)
            }
        }
    }

    /// The generator's own visibility applies: a customer's report only
    /// covers that customer's assets.
    fn actor(&self, job: &GenerateReportJob) -> Result<Actor, JobError> {
        Ok(match self.stores.users.get(&job.user_id)? {
            Some(user) => Actor::new(user.id, user.role),
            None => Actor::customer(job.user_id),
        })
    }

    fn generate(
        &self,
        ctx: &JobContext<'_>,
        job: &GenerateReportJob,
        report: &Report,
    ) -> Result<ReportArtifact, JobError> {
        let actor = self.actor(job)?;
        let project_id: Option<ProjectId> = job.project_id.or(report.project_id);
        let report_type: ReportType = job.report_type;
        ctx.progress(10);

        let project = project_id
            .map(|id| self.stores.projects.find(&actor, &id))
            .transpose()?;
        let assets = self
            .stores
            .assets
            .visible(&actor, &|a| project_id.is_none_or(|p| a.project_id == Some(p)))?;
        let referenced: BTreeSet<ProjectId> = assets.iter().filter_map(|a| a.project_id).collect();
        let projects = self
            .stores
            .projects
            .visible(&actor, &|p| referenced.contains(&p.id))?;
        let project_report_count = match project_id {
            Some(id) => self.stores.reports.scan(&|r| r.project_id == Some(id))?.len(),
            None => 0,
        };
        ctx.progress(40);

        let now = Utc::now();
        let input = ReportInput {
            project: project.as_ref(),
            assets: &assets,
            projects: &projects,
            project_report_count,
            generated_at: now,
        };
        let data = self
            .builders
            .build(report_type, &input)
            .map_err(|e| JobError::Domain(DomainError::validation(e.to_string())))?;
        ctx.progress(70);

        let stored = self
            .artifacts
            .write_json(ARTIFACT_CATEGORY, report_type.file_stem(), &data, now)
            .map_err(JobError::failed)?;
        let artifact = ReportArtifact {
            path: stored.path.display().to_string(),
            url: stored.url,
        };

        let completed = artifact.clone();
        if let Err(e) = self.stores.reports.update_unscoped(&report.id, |r| {
            r.complete(data.clone(), completed.clone(), now)
        }) {
            // No row points at the file once the transition is refused.
            if let Err(rm) = self.artifacts.remove(&stored.path) {
                warn!(report_id = %report.id, path = %artifact.path, error = %rm, "failed to remove orphaned report artifact");
            }
            return Err(e.into());
        }
        Ok(artifact)
    }
}
