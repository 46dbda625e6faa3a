use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use ami_core::{DomainError, DomainResult, Entity, Owned, ProjectId, UserId, Versioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project entity, owned by its creator. Assets and reports reference it by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub metadata: Map<String, JsonValue>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Entity for Project {
    type Id = ProjectId;
    const KIND: &'static str = "project";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Owned for Project {
    fn owner(&self) -> UserId {
        self.created_by
    }
}

impl Versioned for Project {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub metadata: Option<Map<String, JsonValue>>,
}

fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> DomainResult<()> {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(DomainError::validation(
            "end date cannot be before start date",
        )),
        _ => Ok(()),
    }
}

impl Project {
    pub fn create(input: NewProject, created_by: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        check_dates(input.start_date, input.end_date)?;

        Ok(Self {
            id: ProjectId::new(),
            name: name.to_string(),
            description: input.description,
            status: input.status.unwrap_or_default(),
            start_date: input.start_date,
            end_date: input.end_date,
            metadata: input.metadata,
            created_by,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn apply_patch(&mut self, patch: ProjectPatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        check_dates(
            patch.start_date.or(self.start_date),
            patch.end_date.or(self.end_date),
        )?;

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if patch.start_date.is_some() {
            self.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            self.end_date = patch.end_date;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn set_status(&mut self, status: ProjectStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

/// Dashboard counters over the projects visible to an actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub total_projects: usize,
    pub pending_projects: usize,
    pub in_progress_projects: usize,
    pub completed_projects: usize,
    pub cancelled_projects: usize,
}

impl ProjectStats {
    pub fn collect<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Self {
        projects.into_iter().fold(Self::default(), |mut s, p| {
            s.total_projects += 1;
            match p.status {
                ProjectStatus::Pending => s.pending_projects += 1,
                ProjectStatus::InProgress => s.in_progress_projects += 1,
                ProjectStatus::Completed => s.completed_projects += 1,
                ProjectStatus::Cancelled => s.cancelled_projects += 1,
            }
            s
        })
    }
}
