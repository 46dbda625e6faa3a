use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use ami_auth::Actor;
use ami_core::{ExpectedVersion, Page, PageRequest, ProjectId};
use ami_projects::{NewProject, Project, ProjectPatch, ProjectStats, ProjectStatus};

use crate::error::ServiceResult;
use crate::stores::Stores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
}

#[derive(Clone)]
pub struct ProjectsService {
    stores: Stores,
}

impl ProjectsService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub fn create(&self, actor: &Actor, input: NewProject) -> ServiceResult<Project> {
        let project = Project::create(input, actor.id, Utc::now())?;
        let project = self.stores.projects.insert(project)?;
        info!(project_id = %project.id, owner = %project.created_by, "project created");
        Ok(project)
    }

    pub fn find(&self, actor: &Actor, id: ProjectId) -> ServiceResult<Project> {
        Ok(self.stores.projects.find(actor, &id)?)
    }

    pub fn list(&self, actor: &Actor, page: PageRequest, filter: ProjectFilter) -> ServiceResult<Page<Project>> {
        Ok(self
            .stores
            .projects
            .list(actor, page, &|p| filter.status.is_none_or(|s| p.status == s))?)
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: ProjectId,
        patch: ProjectPatch,
        expected: ExpectedVersion,
    ) -> ServiceResult<Project> {
        let now = Utc::now();
        Ok(self
            .stores
            .projects
            .update(actor, &id, expected, |p| p.apply_patch(patch.clone(), now))?)
    }

    pub fn update_status(&self, actor: &Actor, id: ProjectId, status: ProjectStatus) -> ServiceResult<Project> {
        let now = Utc::now();
        Ok(self
            .stores
            .projects
            .update(actor, &id, ExpectedVersion::Any, |p| {
                p.set_status(status, now);
                Ok(())
            })?)
    }

    /// Deletes the project and detaches its assets.
    pub fn remove(&self, actor: &Actor, id: ProjectId) -> ServiceResult<()> {
        self.stores.projects.delete(actor, &id)?;

        let now = Utc::now();
        let attached = self.stores.assets.scan(&|a| a.project_id == Some(id))?;
        for asset in &attached {
            self.stores.assets.update_unscoped(&asset.id, |a| {
                a.project_id = None;
                a.updated_at = now;
                Ok(())
            })?;
        }
        info!(project_id = %id, detached_assets = attached.len(), "project deleted");
        Ok(())
    }

    pub fn stats(&self, actor: &Actor) -> ServiceResult<ProjectStats> {
        let visible = self.stores.projects.visible(actor, &|_| true)?;
        Ok(ProjectStats::collect(&visible))
    }
}
