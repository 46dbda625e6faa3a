//! `ai-processing` queue: scorer first, heuristic fallback on any failure.

use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, warn};

use ami_ai::{AnalysisKind, Analyzer, Assessment, ScoreRequest};
use ami_core::{AssetId, ProjectId, ResidualFormId};
use ami_infra::jobs::{Job, JobContext, JobError, JobRegistry};

use crate::jobs::{AssetDataJob, InsightsJob, ResidualAnalysisJob, kind, queue};
use crate::stores::Stores;

pub fn register(registry: &mut JobRegistry, stores: &Stores, analyzer: &Analyzer) {
    {
        let (stores, analyzer) = (stores.clone(), analyzer.clone());
        let (fb_stores, fb_analyzer) = (stores.clone(), analyzer.clone());
        registry.register_with_fallback(
            queue::AI_PROCESSING,
            kind::PROCESS_RESIDUAL_ANALYSIS,
            move |ctx| residual_analysis(ctx, &stores, &analyzer),
            move |job, err| residual_fallback(job, err, &fb_stores, &fb_analyzer),
        );
    }
    {
        let (analyzer, fb_analyzer) = (analyzer.clone(), analyzer.clone());
        registry.register_with_fallback(
            queue::AI_PROCESSING,
            kind::ANALYZE_ASSET_DATA,
            move |ctx| asset_data_analysis(ctx, &analyzer),
            move |job, err| asset_data_fallback(job, err, &fb_analyzer),
        );
    }
    {
        let (analyzer, fb_analyzer) = (analyzer.clone(), analyzer.clone());
        registry.register_with_fallback(
            queue::AI_PROCESSING,
            kind::GENERATE_INSIGHTS,
            move |ctx| insights(ctx, &analyzer),
            move |job, err| insights_fallback(job, err, &fb_analyzer),
        );
    }
}

static NULL: JsonValue = JsonValue::Null;

/// Payload fields the fallbacks can still use when the payload did not decode.
fn field<'a>(job: &'a Job, key: &str) -> &'a JsonValue {
    job.payload.get(key).unwrap_or(&NULL)
}

fn decode_field<T: serde::de::DeserializeOwned>(job: &Job, key: &str) -> Option<T> {
    serde_json::from_value(field(job, key).clone()).ok()
}

fn residual_result(
    asset_id: Option<AssetId>,
    project_id: Option<ProjectId>,
    analysis_type: &str,
    assessment: &Assessment,
) -> JsonValue {
    json!({
        "assetId": asset_id,
        "projectId": project_id,
        "analysisType": analysis_type,
        "result": assessment,
        "processedAt": Utc::now(),
    })
}

/// Attaches the analysis to the submitted form, if there is one. The job
/// result is authoritative; a form that cannot be updated is only logged.
fn record_on_form(stores: &Stores, form_id: Option<ResidualFormId>, analysis: &JsonValue) {
    let Some(id) = form_id else {
        return;
    };
    let now = Utc::now();
    if let Err(e) = stores
        .residual_forms
        .update_unscoped(&id, |form| form.mark_processed(analysis.clone(), now))
    {
        warn!(residual_form_id = %id, error = %e, "failed to record analysis on residual form");
    }
}

fn residual_analysis(ctx: &JobContext<'_>, stores: &Stores, analyzer: &Analyzer) -> Result<JsonValue, JobError> {
    let job: ResidualAnalysisJob = ctx.payload()?;
    let analysis_type = job
        .analysis_type
        .as_deref()
        .unwrap_or(AnalysisKind::ResidualValue.label())
        .to_string();
    ctx.progress(10);

    let request = ScoreRequest {
        kind: analysis_type.clone(),
        data: job.form_data.clone(),
        asset_id: Some(job.asset_id),
        project_id: job.project_id,
    };
    let assessment = analyzer.score(&request).map_err(JobError::failed)?;
    ctx.progress(90);

    let result = residual_result(Some(job.asset_id), job.project_id, &analysis_type, &assessment);
    record_on_form(stores, job.residual_form_id, &result);
    debug!(job_id = %ctx.job().id, asset_id = %job.asset_id, "residual analysis scored");
    Ok(result)
}

fn residual_fallback(job: &Job, err: &JobError, stores: &Stores, analyzer: &Analyzer) -> JsonValue {
    let form_data = field(job, "formData");
    let analysis_type = field(job, "analysisType")
        .as_str()
        .unwrap_or(AnalysisKind::ResidualValue.label());
    let assessment = analyzer.fallback(AnalysisKind::ResidualValue, form_data, err.to_string());

    let result = residual_result(
        decode_field(job, "assetId"),
        decode_field(job, "projectId"),
        analysis_type,
        &assessment,
    );
    record_on_form(stores, decode_field(job, "residualFormId"), &result);
    result
}

fn asset_data_result(asset_data: &JsonValue, assessment: &Assessment) -> JsonValue {
    json!({
        "assetId": asset_data.get("id").cloned().unwrap_or(JsonValue::Null),
        "analysis": assessment,
        "processedAt": Utc::now(),
    })
}

fn asset_data_analysis(ctx: &JobContext<'_>, analyzer: &Analyzer) -> Result<JsonValue, JobError> {
    let job: AssetDataJob = ctx.payload()?;
    let request = ScoreRequest {
        kind: AnalysisKind::AssetData.label().to_string(),
        data: job.asset_data.clone(),
        asset_id: serde_json::from_value(job.asset_data.get("id").cloned().unwrap_or_default()).ok(),
        project_id: serde_json::from_value(job.asset_data.get("projectId").cloned().unwrap_or_default()).ok(),
    };
    let assessment = analyzer.score(&request).map_err(JobError::failed)?;
    Ok(asset_data_result(&job.asset_data, &assessment))
}

fn asset_data_fallback(job: &Job, err: &JobError, analyzer: &Analyzer) -> JsonValue {
    let asset_data = field(job, "assetData");
    let assessment = analyzer.fallback(AnalysisKind::AssetData, asset_data, err.to_string());
    asset_data_result(asset_data, &assessment)
}

fn insights_result(project_id: JsonValue, assessment: &Assessment) -> JsonValue {
    json!({
        "projectId": project_id,
        "insights": assessment,
        "generatedAt": Utc::now(),
    })
}

fn insights(ctx: &JobContext<'_>, analyzer: &Analyzer) -> Result<JsonValue, JobError> {
    let job: InsightsJob = ctx.payload()?;
    let request = ScoreRequest {
        kind: AnalysisKind::Insights.label().to_string(),
        data: job.data.clone(),
        asset_id: None,
        project_id: Some(job.project_id),
    };
    let assessment = analyzer.score(&request).map_err(JobError::failed)?;
    Ok(insights_result(json!(job.project_id), &assessment))
}

fn insights_fallback(job: &Job, err: &JobError, analyzer: &Analyzer) -> JsonValue {
    let assessment = analyzer.fallback(AnalysisKind::Insights, field(job, "data"), err.to_string());
    insights_result(field(job, "projectId").clone(), &assessment)
}
