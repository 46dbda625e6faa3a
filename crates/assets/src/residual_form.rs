use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ami_core::{AssetId, DomainError, DomainResult, Entity, Owned, ResidualFormId, UserId, Versioned};

/// Residual-value questionnaire submitted for an asset, later annotated with
/// the AI assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualForm {
    pub id: ResidualFormId,
    pub form_data: JsonValue,
    pub ai_analysis: Option<JsonValue>,
    pub is_processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub asset_id: AssetId,
    pub submitted_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Entity for ResidualForm {
    type Id = ResidualFormId;
    const KIND: &'static str = "residual form";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Owned for ResidualForm {
    fn owner(&self) -> UserId {
        self.submitted_by
    }
}

impl Versioned for ResidualForm {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl ResidualForm {
    pub fn submit(
        asset_id: AssetId,
        submitted_by: UserId,
        form_data: JsonValue,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !form_data.is_object() {
            return Err(DomainError::validation("form data must be a JSON object"));
        }
        Ok(Self {
            id: ResidualFormId::new(),
            form_data,
            ai_analysis: None,
            is_processed: false,
            processed_at: None,
            asset_id,
            submitted_by,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Attaches the analysis. A form is processed at most once.
    pub fn mark_processed(&mut self, analysis: JsonValue, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_processed {
            return Err(DomainError::conflict("residual form already processed"));
        }
        self.ai_analysis = Some(analysis);
        self.is_processed = true;
        self.processed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
