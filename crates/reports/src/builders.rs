//! Report payload builders.
//!
//! Builders are pure: they receive already-loaded rows and return the JSON
//! payload that becomes both `Report::data` and the artifact body.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Value as JsonValue, json};
use thiserror::Error;

use ami_assets::Asset;
use ami_core::ProjectId;
use ami_projects::Project;

use crate::report_type::ReportType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("project id is required for {0} report")]
    ProjectRequired(ReportType),
}

/// Rows a builder works on. `assets` is already narrowed to the requested
/// project when one was given.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub project: Option<&'a Project>,
    pub assets: &'a [Asset],
    /// Projects referenced by `assets`, used to resolve project names.
    pub projects: &'a [Project],
    /// Reports already attached to `project`.
    pub project_report_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl ReportInput<'_> {
    fn project_name(&self, id: Option<ProjectId>) -> Option<&str> {
        let id = id?;
        self.projects
            .iter()
            .chain(self.project)
            .find(|p| p.id == id)
            .map(|p| p.name.as_str())
    }
}

pub type ReportBuilder = fn(&ReportInput<'_>) -> Result<JsonValue, BuildError>;

/// Lookup table of builders keyed by report type.
#[derive(Clone)]
pub struct BuilderRegistry {
    builders: HashMap<ReportType, ReportBuilder>,
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ReportType::AssetAnalysis, asset_analysis);
        registry.register(ReportType::ResidualAnalysis, residual_analysis);
        registry.register(ReportType::ProjectSummary, project_summary);
        registry.register(ReportType::General, general);
        registry
    }
}

impl BuilderRegistry {
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: ReportType, builder: ReportBuilder) {
        self.builders.insert(kind, builder);
    }

    /// Runs the builder for `kind`, or the general builder when none is registered.
    pub fn build(&self, kind: ReportType, input: &ReportInput<'_>) -> Result<JsonValue, BuildError> {
        let builder = self
            .builders
            .get(&kind)
            .copied()
            .unwrap_or(general as ReportBuilder);
        builder(input)
    }
}

fn sum(values: impl Iterator<Item = Option<f64>>) -> f64 {
    values.map(|v| v.unwrap_or(0.0)).sum()
}

fn average(total: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}

fn asset_rows(input: &ReportInput<'_>, with_project: bool) -> Vec<JsonValue> {
    input
        .assets
        .iter()
        .map(|a| {
            let mut row = json!({
                "id": a.id.to_string(),
                "name": a.name,
                "type": a.asset_type,
                "value": a.value,
                "residualValue": a.residual_value,
                "status": a.status,
            });
            if with_project {
                row["projectName"] = json!(input.project_name(a.project_id));
            }
            row
        })
        .collect()
}

pub fn asset_analysis(input: &ReportInput<'_>) -> Result<JsonValue, BuildError> {
    let total_value = sum(input.assets.iter().map(|a| a.value));
    let total_residual = sum(input.assets.iter().map(|a| a.residual_value));
    Ok(json!({
        "reportType": ReportType::AssetAnalysis,
        "generatedAt": input.generated_at,
        "summary": {
            "totalAssets": input.assets.len(),
            "totalValue": total_value,
            "totalResidualValue": total_residual,
            "averageValue": average(total_value, input.assets.len()),
        },
        "assets": asset_rows(input, true),
    }))
}

/// Only assets with a recorded residual value are analysed.
pub fn residual_analysis(input: &ReportInput<'_>) -> Result<JsonValue, BuildError> {
    let assessed: Vec<&Asset> = input
        .assets
        .iter()
        .filter(|a| a.residual_value.is_some())
        .collect();

    let analysis: Vec<(f64, JsonValue)> = assessed
        .iter()
        .map(|a| {
            let original = a.value.unwrap_or(0.0);
            let depreciation = original - a.residual_value.unwrap_or(0.0);
            let rate = if original != 0.0 {
                depreciation / original * 100.0
            } else {
                0.0
            };
            let row = json!({
                "id": a.id.to_string(),
                "name": a.name,
                "type": a.asset_type,
                "originalValue": a.value,
                "residualValue": a.residual_value,
                "depreciation": depreciation,
                "depreciationRate": rate,
                "projectName": input.project_name(a.project_id),
            });
            (depreciation, row)
        })
        .collect();

    Ok(json!({
        "reportType": ReportType::ResidualAnalysis,
        "generatedAt": input.generated_at,
        "summary": {
            "totalAssets": assessed.len(),
            "totalOriginalValue": sum(assessed.iter().map(|a| a.value)),
            "totalResidualValue": sum(assessed.iter().map(|a| a.residual_value)),
            "totalDepreciation": analysis.iter().map(|(d, _)| d).sum::<f64>(),
        },
        "analysis": analysis.into_iter().map(|(_, row)| row).collect::<Vec<_>>(),
    }))
}

pub fn project_summary(input: &ReportInput<'_>) -> Result<JsonValue, BuildError> {
    let project = input
        .project
        .ok_or(BuildError::ProjectRequired(ReportType::ProjectSummary))?;
    let total_value = sum(input.assets.iter().map(|a| a.value));
    let total_residual = sum(input.assets.iter().map(|a| a.residual_value));

    Ok(json!({
        "reportType": ReportType::ProjectSummary,
        "generatedAt": input.generated_at,
        "project": {
            "id": project.id.to_string(),
            "name": project.name,
            "description": project.description,
            "status": project.status,
            "startDate": project.start_date,
            "endDate": project.end_date,
            "createdAt": project.created_at,
        },
        "summary": {
            "totalAssets": input.assets.len(),
            "totalReports": input.project_report_count,
            "totalAssetValue": total_value,
            "totalResidualValue": total_residual,
            "averageAssetValue": average(total_value, input.assets.len()),
        },
        "assets": asset_rows(input, false),
    }))
}

pub fn general(input: &ReportInput<'_>) -> Result<JsonValue, BuildError> {
    Ok(json!({
        "reportType": ReportType::General,
        "generatedAt": input.generated_at,
        "summary": {
            "totalAssets": input.assets.len(),
            "totalValue": sum(input.assets.iter().map(|a| a.value)),
            "totalResidualValue": sum(input.assets.iter().map(|a| a.residual_value)),
        },
        "assets": asset_rows(input, true),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ami_assets::NewAsset;
    use ami_core::UserId;
    use ami_projects::NewProject;

    fn asset(value: Option<f64>, residual: Option<f64>, project: Option<ProjectId>) -> Asset {
        Asset::create(
            NewAsset {
                name: "Forklift".into(),
                asset_type: "equipment".into(),
                value,
                residual_value: residual,
                project_id: project,
                ..Default::default()
            },
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    fn project() -> Project {
        Project::create(
            NewProject {
                name: "Warehouse".into(),
                ..Default::default()
            },
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn asset_analysis_summarises_and_names_projects() {
        let p = project();
        let assets = vec![asset(Some(100.0), Some(40.0), Some(p.id)), asset(Some(300.0), None, None)];
        let input = ReportInput {
            project: None,
            assets: &assets,
            projects: std::slice::from_ref(&p),
            project_report_count: 0,
            generated_at: Utc::now(),
        };
        let out = BuilderRegistry::default()
            .build(ReportType::AssetAnalysis, &input)
            .unwrap();
        assert_eq!(out["reportType"], "asset_analysis");
        assert_eq!(out["summary"]["totalAssets"], 2);
        assert_eq!(out["summary"]["averageValue"], 200.0);
        assert_eq!(out["assets"][0]["projectName"], "Warehouse");
        assert_eq!(out["assets"][1]["projectName"], JsonValue::Null);
    }

    #[test]
    fn residual_analysis_skips_unassessed_assets() {
        let assets = vec![asset(Some(1000.0), Some(600.0), None), asset(Some(50.0), None, None)];
        let input = ReportInput {
            project: None,
            assets: &assets,
            projects: &[],
            project_report_count: 0,
            generated_at: Utc::now(),
        };
        let out = residual_analysis(&input).unwrap();
        assert_eq!(out["summary"]["totalAssets"], 1);
        assert_eq!(out["summary"]["totalDepreciation"], 400.0);
        assert_eq!(out["analysis"][0]["depreciationRate"], 40.0);
    }

    #[test]
    fn project_summary_requires_a_project() {
        let input = ReportInput {
            project: None,
            assets: &[],
            projects: &[],
            project_report_count: 0,
            generated_at: Utc::now(),
        };
        assert_eq!(
            project_summary(&input).unwrap_err(),
            BuildError::ProjectRequired(ReportType::ProjectSummary)
        );
    }

    #[test]
    fn unregistered_type_uses_general_builder() {
        let mut registry = BuilderRegistry::empty();
        registry.register(ReportType::AssetAnalysis, asset_analysis);
        let input = ReportInput {
            project: None,
            assets: &[],
            projects: &[],
            project_report_count: 0,
            generated_at: Utc::now(),
        };
        let out = registry.build(ReportType::ResidualAnalysis, &input).unwrap();
        assert_eq!(out["reportType"], "general");
        assert_eq!(out["summary"]["totalValue"], 0.0);
    }
}
