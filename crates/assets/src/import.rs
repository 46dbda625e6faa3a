//! Bulk-import row model.
//!
//! A row is one CSV record keyed by header. Parsing is strict about the
//! duplicate key (`name`, `type`) and JSON columns, lenient about numbers:
//! an unparseable value counts as absent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use ami_core::{DomainError, DomainResult, ProjectId, UserId};

use crate::asset::{Asset, AssetStatus, NewAsset};

/// What to do when a row matches an asset that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    Skip,
    UpdateExisting,
    /// Create a new asset even when one with the same key exists.
    CreateNew,
}

impl DuplicatePolicy {
    /// Resolves the caller's flags. `skip` defaults to true, `update` to false;
    /// asking for both is rejected.
    pub fn from_flags(skip: Option<bool>, update: Option<bool>) -> DomainResult<Self> {
        match (skip, update.unwrap_or(false)) {
            (Some(true), true) => Err(DomainError::validation(
                "skipDuplicates and updateExisting are mutually exclusive",
            )),
            (_, true) => Ok(Self::UpdateExisting),
            (None | Some(true), false) => Ok(Self::Skip),
            (Some(false), false) => Ok(Self::CreateNew),
        }
    }
}

/// Per-import counters. `processed + skipped + errors == total` once the
/// whole file has been consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTally {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total: usize,
}

impl ImportTally {
    pub fn record_processed(&mut self) {
        self.processed += 1;
        self.total += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
        self.total += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
        self.total += 1;
    }

    pub fn is_balanced(&self) -> bool {
        self.processed + self.skipped + self.errors == self.total
    }
}

/// A parsed import row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub name: String,
    pub asset_type: String,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub residual_value: Option<f64>,
    pub properties: Option<Map<String, JsonValue>>,
    pub metadata: Option<Map<String, JsonValue>>,
}

fn text(record: &HashMap<String, String>, key: &str) -> Option<String> {
    record
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn number(record: &HashMap<String, String>, key: &str) -> Option<f64> {
    text(record, key)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn json_object(
    record: &HashMap<String, String>,
    key: &str,
) -> DomainResult<Option<Map<String, JsonValue>>> {
    let Some(raw) = text(record, key) else {
        return Ok(None);
    };
    match serde_json::from_str::<JsonValue>(&raw) {
        Ok(JsonValue::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(DomainError::validation(format!("{key} must be a JSON object"))),
        Err(e) => Err(DomainError::validation(format!("{key} is not valid JSON: {e}"))),
    }
}

impl ImportRow {
    pub fn parse(record: &HashMap<String, String>) -> DomainResult<Self> {
        let name = text(record, "name").ok_or_else(|| DomainError::validation("name is required"))?;
        let asset_type =
            text(record, "type").ok_or_else(|| DomainError::validation("type is required"))?;

        Ok(Self {
            name,
            asset_type,
            description: text(record, "description"),
            value: number(record, "value"),
            residual_value: number(record, "residualValue"),
            properties: json_object(record, "properties")?,
            metadata: json_object(record, "metadata")?,
        })
    }

    /// New active asset; missing numbers become zero.
    pub fn into_asset(
        self,
        project_id: Option<ProjectId>,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Asset> {
        Asset::create(
            NewAsset {
                name: self.name,
                description: self.description,
                asset_type: self.asset_type,
                value: Some(self.value.unwrap_or(0.0)),
                residual_value: Some(self.residual_value.unwrap_or(0.0)),
                status: Some(AssetStatus::Active),
                properties: self.properties.unwrap_or_default(),
                metadata: self.metadata.unwrap_or_default(),
                project_id,
            },
            created_by,
            now,
        )
    }

    /// Overwrites an existing asset. Zero or missing numbers and absent JSON
    /// columns keep the current values; the description is always replaced.
    pub fn apply_to(self, asset: &mut Asset, now: DateTime<Utc>) {
        asset.description = self.description;
        if let Some(v) = self.value.filter(|v| *v != 0.0) {
            asset.value = Some(v);
        }
        if let Some(v) = self.residual_value.filter(|v| *v != 0.0) {
            asset.residual_value = Some(v);
        }
        if let Some(p) = self.properties {
            asset.properties = p;
        }
        if let Some(m) = self.metadata {
            asset.metadata = m;
        }
        asset.updated_at = now;
    }
}
