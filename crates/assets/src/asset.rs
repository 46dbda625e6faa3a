use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use ami_core::{AssetId, DomainError, DomainResult, Entity, Owned, ProjectId, UserId, Versioned};

/// Asset lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Active => "active",
            AssetStatus::Inactive => "inactive",
            AssetStatus::Archived => "archived",
        }
    }
}

impl core::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset entity, owned by its creator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub value: Option<f64>,
    pub residual_value: Option<f64>,
    pub status: AssetStatus,
    pub properties: Map<String, JsonValue>,
    pub metadata: Map<String, JsonValue>,
    pub project_id: Option<ProjectId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Entity for Asset {
    type Id = AssetId;
    const KIND: &'static str = "asset";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Owned for Asset {
    fn owner(&self) -> UserId {
        self.created_by
    }
}

impl Versioned for Asset {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Validated input for creating an asset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub value: Option<f64>,
    pub residual_value: Option<f64>,
    pub status: Option<AssetStatus>,
    #[serde(default)]
    pub properties: Map<String, JsonValue>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
    pub project_id: Option<ProjectId>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
    pub value: Option<f64>,
    pub residual_value: Option<f64>,
    pub status: Option<AssetStatus>,
    pub properties: Option<Map<String, JsonValue>>,
    pub metadata: Option<Map<String, JsonValue>>,
    pub project_id: Option<ProjectId>,
}

fn non_empty(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn money(field: &str, value: Option<f64>) -> DomainResult<Option<f64>> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(DomainError::validation(format!(
            "{field} must be a finite non-negative number"
        ))),
        other => Ok(other),
    }
}

impl Asset {
    pub fn create(input: NewAsset, created_by: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: AssetId::new(),
            name: non_empty("name", &input.name)?,
            description: input.description,
            asset_type: non_empty("type", &input.asset_type)?,
            value: money("value", input.value)?,
            residual_value: money("residual value", input.residual_value)?,
            status: input.status.unwrap_or_default(),
            properties: input.properties,
            metadata: input.metadata,
            project_id: input.project_id,
            created_by,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn apply_patch(&mut self, patch: AssetPatch, now: DateTime<Utc>) -> DomainResult<()> {
        // Validate everything before mutating anything.
        let name = patch.name.as_deref().map(|n| non_empty("name", n)).transpose()?;
        let asset_type = patch
            .asset_type
            .as_deref()
            .map(|t| non_empty("type", t))
            .transpose()?;
        let value = money("value", patch.value)?;
        let residual_value = money("residual value", patch.residual_value)?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(asset_type) = asset_type {
            self.asset_type = asset_type;
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if value.is_some() {
            self.value = value;
        }
        if residual_value.is_some() {
            self.residual_value = residual_value;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(properties) = patch.properties {
            self.properties = properties;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        if patch.project_id.is_some() {
            self.project_id = patch.project_id;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn set_status(&mut self, status: AssetStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    /// Duplicate key used by bulk import.
    pub fn matches_key(&self, name: &str, asset_type: &str) -> bool {
        self.name == name && self.asset_type == asset_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_asset() -> NewAsset {
        NewAsset {
            name: "Laptop".into(),
            asset_type: "equipment".into(),
            value: Some(1500.0),
            ..Default::default()
        }
    }

    #[test]
    fn create_defaults_to_active() {
        let a = Asset::create(new_asset(), UserId::new(), Utc::now()).unwrap();
        assert_eq!(a.status, AssetStatus::Active);
        assert_eq!(a.version, 0);
    }

    #[test]
    fn create_rejects_blank_name_and_negative_value() {
        let mut input = new_asset();
        input.name = "  ".into();
        assert!(Asset::create(input, UserId::new(), Utc::now()).is_err());

        let mut input = new_asset();
        input.value = Some(-1.0);
        assert!(Asset::create(input, UserId::new(), Utc::now()).is_err());
    }

    #[test]
    fn invalid_patch_leaves_asset_untouched() {
        let mut a = Asset::create(new_asset(), UserId::new(), Utc::now()).unwrap();
        let before = a.clone();
        let patch = AssetPatch {
            name: Some("Renamed".into()),
            value: Some(f64::NAN),
            ..Default::default()
        };
        assert!(a.apply_patch(patch, Utc::now()).is_err());
        assert_eq!(a, before);
    }

    #[test]
    fn serializes_type_field_under_its_wire_name() {
        let a = Asset::create(new_asset(), UserId::new(), Utc::now()).unwrap();
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "equipment");
        assert_eq!(json["residualValue"], JsonValue::Null);
    }
}
