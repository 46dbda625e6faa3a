use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use ami_core::{DomainError, DomainResult, Entity, Owned, ProjectId, ReportId, UserId, Versioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Generating,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Generating => "generating",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Generating)
    }
}

impl core::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of a written report artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub path: String,
    pub url: String,
}

/// Everything a transport needs to stream a finished report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDownload {
    pub file_path: String,
    pub file_name: String,
    pub mime_type: &'static str,
}

/// Report entity.
///
/// `file_path`/`file_url` are only ever set together with the transition to
/// `completed`, and a failed report always carries `metadata.error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: ReportId,
    pub name: String,
    pub description: Option<String>,
    status: ReportStatus,
    data: Option<JsonValue>,
    pub metadata: Map<String, JsonValue>,
    file_path: Option<String>,
    file_url: Option<String>,
    generated_at: Option<DateTime<Utc>>,
    pub project_id: Option<ProjectId>,
    pub generated_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Entity for Report {
    type Id = ReportId;
    const KIND: &'static str = "report";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Owned for Report {
    fn owner(&self) -> UserId {
        self.generated_by
    }
}

impl Versioned for Report {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
    pub project_id: Option<ProjectId>,
}

/// Descriptive fields only; status and artifact are owned by the generator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Map<String, JsonValue>>,
}

impl Report {
    pub fn request(input: NewReport, generated_by: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let mut metadata = input.metadata;
        metadata.remove("error");
        Ok(Self {
            id: ReportId::new(),
            name: name.to_string(),
            description: input.description,
            status: ReportStatus::Generating,
            data: None,
            metadata,
            file_path: None,
            file_url: None,
            generated_at: None,
            project_id: input.project_id,
            generated_by,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn status(&self) -> ReportStatus {
        self.status
    }

    pub fn data(&self) -> Option<&JsonValue> {
        self.data.as_ref()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn file_url(&self) -> Option<&str> {
        self.file_url.as_deref()
    }

    pub fn generated_at(&self) -> Option<DateTime<Utc>> {
        self.generated_at
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.metadata.get("error").and_then(JsonValue::as_str)
    }

    fn ensure_generating(&self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "report is already {}",
                self.status
            )));
        }
        Ok(())
    }

    /// `generating -> completed`, attaching payload and artifact together.
    pub fn complete(
        &mut self,
        data: JsonValue,
        artifact: ReportArtifact,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_generating()?;
        self.data = Some(data);
        self.file_path = Some(artifact.path);
        self.file_url = Some(artifact.url);
        self.generated_at = Some(now);
        self.status = ReportStatus::Completed;
        self.updated_at = now;
        Ok(())
    }

    /// `generating -> failed`; the reason is merged into metadata under `error`.
    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_generating()?;
        self.metadata
            .insert("error".to_string(), JsonValue::String(reason.into()));
        self.status = ReportStatus::Failed;
        self.updated_at = now;
        Ok(())
    }

    pub fn download(&self) -> DomainResult<ReportDownload> {
        if self.status != ReportStatus::Completed {
            return Err(DomainError::invariant("report is not ready for download"));
        }
        let file_path = self
            .file_path
            .clone()
            .ok_or_else(|| DomainError::invariant("report file not found"))?;
        Ok(ReportDownload {
            file_path,
            file_name: format!("{}.json", self.name),
            mime_type: "application/json",
        })
    }

    pub fn apply_patch(&mut self, patch: ReportPatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if let Some(metadata) = patch.metadata {
            // `error` is written by the generator only.
            let error = self.metadata.remove("error");
            self.metadata = metadata;
            match error {
                Some(e) => {
                    self.metadata.insert("error".to_string(), e);
                }
                None => {
                    self.metadata.remove("error");
                }
            }
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub total_reports: usize,
    pub generating_reports: usize,
    pub completed_reports: usize,
    pub failed_reports: usize,
}

impl ReportStats {
    pub fn collect<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Self {
        reports.into_iter().fold(Self::default(), |mut s, r| {
            s.total_reports += 1;
            match r.status {
                ReportStatus::Generating => s.generating_reports += 1,
                ReportStatus::Completed => s.completed_reports += 1,
                ReportStatus::Failed => s.failed_reports += 1,
            }
            s
        })
    }
}
