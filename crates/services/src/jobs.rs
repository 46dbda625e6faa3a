//! Queue names, job types and their payloads.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ami_assets::DuplicatePolicy;
use ami_core::{AssetId, ProjectId, ReportId, ResidualFormId, UserId};
use ami_infra::jobs::{JobHandle, JobId};
use ami_reports::ReportType;

pub mod queue {
    pub const AI_PROCESSING: &str = "ai-processing";
    pub const ASSET_IMPORT: &str = "asset-import";
    pub const REPORT_GENERATION: &str = "report-generation";
    pub const EMAIL: &str = "email";
}

pub mod kind {
    pub const PROCESS_RESIDUAL_ANALYSIS: &str = "process-residual-analysis";
    pub const ANALYZE_ASSET_DATA: &str = "analyze-asset-data";
    pub const GENERATE_INSIGHTS: &str = "generate-insights";
    pub const BULK_IMPORT: &str = "bulk-import";
    pub const GENERATE_REPORT: &str = "generate-report";
    pub const SEND_EMAIL: &str = "send-email";
    pub const SEND_INVITATION: &str = "send-invitation";
    pub const SEND_PASSWORD_RESET: &str = "send-password-reset";
    pub const SEND_EMAIL_VERIFICATION: &str = "send-email-verification";
}

/// Returned by every call that defers work to a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: JobId,
    pub queue: String,
    pub message: String,
}

impl JobAccepted {
    pub fn new(handle: JobHandle, message: impl Into<String>) -> Self {
        Self {
            job_id: handle.id,
            queue: handle.queue,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualAnalysisJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_form_id: Option<ResidualFormId>,
    pub asset_id: AssetId,
    pub form_data: JsonValue,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub analysis_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDataJob {
    pub asset_data: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsJob {
    pub project_id: ProjectId,
    pub data: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportJob {
    pub file_path: PathBuf,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    pub user_id: UserId,
    pub policy: DuplicatePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportJob {
    pub report_id: ReportId,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub report_type: ReportType,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationMailJob {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub invitation_token: String,
    #[serde(default)]
    pub custom_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetMailJob {
    pub email: String,
    pub reset_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMailJob {
    pub email: String,
    pub verification_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_job_defaults_to_general() {
        let job: GenerateReportJob = serde_json::from_value(json!({
            "reportId": ReportId::new(),
            "userId": UserId::new(),
        }))
        .unwrap();
        assert_eq!(job.report_type, ReportType::General);
        assert!(job.project_id.is_none());
    }

    #[test]
    fn import_job_uses_camel_case() {
        let job = BulkImportJob {
            file_path: PathBuf::from("/tmp/upload.csv"),
            project_id: None,
            user_id: UserId::new(),
            policy: DuplicatePolicy::Skip,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["filePath"], "/tmp/upload.csv");
        assert_eq!(value["policy"], "skip");
    }
}
