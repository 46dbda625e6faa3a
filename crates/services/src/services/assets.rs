use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use ami_assets::{
    Asset, AssetPatch, AssetStats, AssetStatus, DuplicatePolicy, FormField, NewAsset, ResidualForm,
    asset_form_fields,
};
use ami_auth::Actor;
use ami_core::{AssetId, ExpectedVersion, Page, PageRequest, ProjectId};
use ami_infra::jobs::{JobId, JobRuntime, JobStatusView};

use crate::error::ServiceResult;
use crate::jobs::{BulkImportJob, JobAccepted, ResidualAnalysisJob, kind, queue};
use crate::stores::Stores;

/// Bulk import of an already-uploaded CSV file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportRequest {
    pub file_path: PathBuf,
    pub project_id: Option<ProjectId>,
    pub skip_duplicates: Option<bool>,
    pub update_existing: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFilter {
    pub project_id: Option<ProjectId>,
    pub status: Option<AssetStatus>,
}

impl AssetFilter {
    fn matches(&self, asset: &Asset) -> bool {
        self.project_id.is_none_or(|p| asset.project_id == Some(p))
            && self.status.is_none_or(|s| asset.status == s)
    }
}

/// A stored residual-value form plus the analysis job it started.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualSubmission {
    pub form: ResidualForm,
    pub job: JobAccepted,
}

#[derive(Clone)]
pub struct AssetsService {
    stores: Stores,
    runtime: Arc<JobRuntime>,
}

impl AssetsService {
    pub fn new(stores: Stores, runtime: Arc<JobRuntime>) -> Self {
        Self { stores, runtime }
    }

    fn ensure_project_visible(&self, actor: &Actor, project_id: Option<ProjectId>) -> ServiceResult<()> {
        if let Some(id) = project_id {
            self.stores.projects.find(actor, &id)?;
        }
        Ok(())
    }

    pub fn create(&self, actor: &Actor, input: NewAsset) -> ServiceResult<Asset> {
        self.ensure_project_visible(actor, input.project_id)?;
        let asset = Asset::create(input, actor.id, Utc::now())?;
        let asset = self.stores.assets.insert(asset)?;
        info!(asset_id = %asset.id, owner = %asset.created_by, "asset created");
        Ok(asset)
    }

    pub fn find(&self, actor: &Actor, id: AssetId) -> ServiceResult<Asset> {
        Ok(self.stores.assets.find(actor, &id)?)
    }

    pub fn list(&self, actor: &Actor, page: PageRequest, filter: AssetFilter) -> ServiceResult<Page<Asset>> {
        Ok(self.stores.assets.list(actor, page, &|a| filter.matches(a))?)
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: AssetId,
        patch: AssetPatch,
        expected: ExpectedVersion,
    ) -> ServiceResult<Asset> {
        self.ensure_project_visible(actor, patch.project_id)?;
        let now = Utc::now();
        Ok(self
            .stores
            .assets
            .update(actor, &id, expected, |asset| asset.apply_patch(patch.clone(), now))?)
    }

    pub fn update_status(&self, actor: &Actor, id: AssetId, status: AssetStatus) -> ServiceResult<Asset> {
        let now = Utc::now();
        Ok(self
            .stores
            .assets
            .update(actor, &id, ExpectedVersion::Any, |asset| {
                asset.set_status(status, now);
                Ok(())
            })?)
    }

    pub fn remove(&self, actor: &Actor, id: AssetId) -> ServiceResult<()> {
        let removed = self.stores.assets.delete(actor, &id)?;
        info!(asset_id = %removed.id, "asset deleted");
        Ok(())
    }

    pub fn stats(&self, actor: &Actor) -> ServiceResult<AssetStats> {
        let visible = self.stores.assets.visible(actor, &|_| true)?;
        Ok(AssetStats::collect(&visible))
    }

    pub fn form_fields(&self) -> Vec<FormField> {
        asset_form_fields()
    }

    /// Validates the request and defers the import to the `asset-import` queue.
    pub fn bulk_import(&self, actor: &Actor, request: BulkImportRequest) -> ServiceResult<JobAccepted> {
        let policy = DuplicatePolicy::from_flags(request.skip_duplicates, request.update_existing)?;
        self.ensure_project_visible(actor, request.project_id)?;

        let payload = BulkImportJob {
            file_path: request.file_path,
            project_id: request.project_id,
            user_id: actor.id,
            policy,
        };
        let handle = self
            .runtime
            .enqueue_json(queue::ASSET_IMPORT, kind::BULK_IMPORT, &payload)?;
        info!(job_id = %handle.id, user_id = %actor.id, ?policy, "bulk import enqueued");
        Ok(JobAccepted::new(handle, "Bulk import job started"))
    }

    pub fn import_status(&self, job_id: JobId) -> ServiceResult<JobStatusView> {
        Ok(self.runtime.status(queue::ASSET_IMPORT, job_id)?)
    }

    /// Stores an unprocessed residual form for a visible asset and requests
    /// its analysis.
    pub fn submit_residual_form(
        &self,
        actor: &Actor,
        asset_id: AssetId,
        form_data: JsonValue,
    ) -> ServiceResult<ResidualSubmission> {
        let asset = self.stores.assets.find(actor, &asset_id)?;
        let form = ResidualForm::submit(asset.id, actor.id, form_data, Utc::now())?;
        let form = self.stores.residual_forms.insert(form)?;

        let payload = ResidualAnalysisJob {
            residual_form_id: Some(form.id),
            asset_id: asset.id,
            form_data: form.form_data.clone(),
            project_id: asset.project_id,
            analysis_type: None,
        };
        let handle = self
            .runtime
            .enqueue_json(queue::AI_PROCESSING, kind::PROCESS_RESIDUAL_ANALYSIS, &payload)?;
        Ok(ResidualSubmission {
            form,
            job: JobAccepted::new(handle, "Residual analysis processing started"),
        })
    }

    pub fn residual_forms(&self, actor: &Actor, asset_id: AssetId) -> ServiceResult<Vec<ResidualForm>> {
        self.stores.assets.find(actor, &asset_id)?;
        Ok(self
            .stores
            .residual_forms
            .visible(actor, &|f| f.asset_id == asset_id)?)
    }
}
