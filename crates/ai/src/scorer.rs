use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ami_core::{AssetId, ProjectId};

use crate::result::{AiError, Estimate};

/// Input handed to an external scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    /// Analysis type label, e.g. `residual_value_analysis`.
    #[serde(rename = "type")]
    pub kind: String,
    pub data: JsonValue,
    pub asset_id: Option<AssetId>,
    pub project_id: Option<ProjectId>,
}

/// Pluggable external model.
///
/// Implementations may block (the caller runs on a worker thread).
pub trait Scorer: Send + Sync + 'static {
    fn score(&self, request: &ScoreRequest) -> Result<Estimate, AiError>;
}

/// Stand-in used when no scorer endpoint/key is configured; every call fails
/// with [`AiError::NotConfigured`], which routes callers onto the heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredScorer;

impl Scorer for UnconfiguredScorer {
    fn score(&self, _request: &ScoreRequest) -> Result<Estimate, AiError> {
        Err(AiError::NotConfigured)
    }
}

impl<F> Scorer for F
where
    F: Fn(&ScoreRequest) -> Result<Estimate, AiError> + Send + Sync + 'static,
{
    fn score(&self, request: &ScoreRequest) -> Result<Estimate, AiError> {
        self(request)
    }
}
