use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::info;

use ami_auth::Actor;
use ami_core::{AssetId, DomainError, ProjectId};
use ami_infra::jobs::{JobId, JobRuntime, JobStatusView};

use crate::error::ServiceResult;
use crate::jobs::{AssetDataJob, InsightsJob, JobAccepted, ResidualAnalysisJob, kind, queue};
use crate::stores::Stores;

/// Requests analyses on the `ai-processing` queue. Results are only
/// available by polling the job.
#[derive(Clone)]
pub struct AiService {
    stores: Stores,
    runtime: Arc<JobRuntime>,
}

impl AiService {
    pub fn new(stores: Stores, runtime: Arc<JobRuntime>) -> Self {
        Self { stores, runtime }
    }

    /// Residual valuation of ad-hoc form data that is not stored as a form.
    pub fn process_residual_analysis(
        &self,
        actor: &Actor,
        asset_id: AssetId,
        form_data: JsonValue,
        analysis_type: Option<String>,
    ) -> ServiceResult<JobAccepted> {
        if !form_data.is_object() {
            return Err(DomainError::validation("formData must be an object").into());
        }
        let asset = self.stores.assets.find(actor, &asset_id)?;
        let payload = ResidualAnalysisJob {
            residual_form_id: None,
            asset_id: asset.id,
            form_data,
            project_id: asset.project_id,
            analysis_type,
        };
        let handle = self
            .runtime
            .enqueue_json(queue::AI_PROCESSING, kind::PROCESS_RESIDUAL_ANALYSIS, &payload)?;
        info!(job_id = %handle.id, asset_id = %asset.id, "residual analysis enqueued");
        Ok(JobAccepted::new(handle, "Residual analysis processing started"))
    }

    pub fn analyze_asset(&self, actor: &Actor, asset_id: AssetId) -> ServiceResult<JobAccepted> {
        let asset = self.stores.assets.find(actor, &asset_id)?;
        let asset_data =
            serde_json::to_value(&asset).map_err(|e| DomainError::invariant(e.to_string()))?;
        let handle = self.runtime.enqueue_json(
            queue::AI_PROCESSING,
            kind::ANALYZE_ASSET_DATA,
            &AssetDataJob { asset_data },
        )?;
        info!(job_id = %handle.id, asset_id = %asset.id, "asset analysis enqueued");
        Ok(JobAccepted::new(handle, "Asset data analysis started"))
    }

    pub fn generate_insights(
        &self,
        actor: &Actor,
        project_id: ProjectId,
        data: JsonValue,
    ) -> ServiceResult<JobAccepted> {
        let project = self.stores.projects.find(actor, &project_id)?;
        let handle = self.runtime.enqueue_json(
            queue::AI_PROCESSING,
            kind::GENERATE_INSIGHTS,
            &InsightsJob {
                project_id: project.id,
                data,
            },
        )?;
        info!(job_id = %handle.id, project_id = %project.id, "insights generation enqueued");
        Ok(JobAccepted::new(handle, "Insights generation started"))
    }

    pub fn job_status(&self, job_id: JobId) -> ServiceResult<JobStatusView> {
        Ok(self.runtime.status(queue::AI_PROCESSING, job_id)?)
    }
}
