use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::heuristics::{asset_data, insights, residual};
use crate::result::{AiError, Assessment, Estimate};
use crate::scorer::{ScoreRequest, Scorer, UnconfiguredScorer};

/// The analyses the system can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    ResidualValue,
    AssetData,
    Insights,
}

impl AnalysisKind {
    /// Label sent to the scorer as the request type.
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisKind::ResidualValue => "residual_value_analysis",
            AnalysisKind::AssetData => "asset_data_analysis",
            AnalysisKind::Insights => "portfolio_insights",
        }
    }

    /// Deterministic local estimate for `data`.
    pub fn heuristic(&self, data: &JsonValue) -> Estimate {
        match self {
            AnalysisKind::ResidualValue => residual::estimate(data),
            AnalysisKind::AssetData => asset_data::estimate(data),
            AnalysisKind::Insights => insights::estimate(data),
        }
    }
}

/// Runs analyses against a scorer, with heuristic fallback.
#[derive(Clone)]
pub struct Analyzer {
    scorer: Arc<dyn Scorer>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(Arc::new(UnconfiguredScorer))
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer").finish_non_exhaustive()
    }
}

impl Analyzer {
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Self { scorer }
    }

    /// Scorer only; errors are returned to the caller.
    pub fn score(&self, request: &ScoreRequest) -> Result<Assessment, AiError> {
        let estimate = self.scorer.score(request)?;
        debug!(kind = %request.kind, confidence = estimate.confidence, "scorer answered");
        Ok(Assessment::scored(estimate))
    }

    /// Heuristic estimate tagged with the reason the scorer was bypassed.
    pub fn fallback(&self, kind: AnalysisKind, data: &JsonValue, reason: impl Into<String>) -> Assessment {
        Assessment::fallback(kind.heuristic(data), reason)
    }

    /// Scorer first, heuristic on any scorer error. Never fails.
    pub fn assess(&self, kind: AnalysisKind, request: &ScoreRequest) -> Assessment {
        match self.score(request) {
            Ok(a) => a,
            Err(e) => {
                warn!(kind = %request.kind, error = %e, "scorer unavailable; using heuristic");
                self.fallback(kind, &request.data, e.to_string())
            }
        }
    }
}
