use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Raw estimate produced either by a scorer or by a heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub result: JsonValue,

    /// Confidence in \[0, 1\].
    pub confidence: f64,
}

impl Estimate {
    pub fn new(result: JsonValue, confidence: f64) -> Self {
        Self { result, confidence }
    }
}

/// Provenance-tagged analysis outcome.
///
/// Serialized with a `source` tag (`"scored"` / `"fallback"`) so consumers can
/// tell a model answer from a local substitute without parsing error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Assessment {
    Scored {
        result: JsonValue,
        confidence: f64,
    },
    Fallback {
        result: JsonValue,
        confidence: f64,
        reason: String,
    },
}

impl Assessment {
    pub fn scored(estimate: Estimate) -> Self {
        Assessment::Scored {
            result: estimate.result,
            confidence: estimate.confidence,
        }
    }

    pub fn fallback(estimate: Estimate, reason: impl Into<String>) -> Self {
        Assessment::Fallback {
            result: estimate.result,
            confidence: estimate.confidence,
            reason: reason.into(),
        }
    }

    pub fn result(&self) -> &JsonValue {
        match self {
            Assessment::Scored { result, .. } | Assessment::Fallback { result, .. } => result,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Assessment::Scored { confidence, .. } | Assessment::Fallback { confidence, .. } => *confidence,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Assessment::Fallback { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Assessment::Scored { .. } => None,
            Assessment::Fallback { reason, .. } => Some(reason),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AiError {
    #[error("AI scorer is not configured")]
    NotConfigured,

    #[error("invalid analysis input: {0}")]
    InvalidInput(String),

    #[error("scoring failed: {0}")]
    ScoringFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_source_tag() {
        let a = Assessment::fallback(Estimate::new(json!({"v": 1}), 0.7), "timeout");
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["source"], "fallback");
        assert_eq!(v["reason"], "timeout");
        assert_eq!(v["confidence"], 0.7);

        let back: Assessment = serde_json::from_value(v).unwrap();
        assert_eq!(back.reason(), Some("timeout"));

        let s = serde_json::to_value(Assessment::scored(Estimate::new(json!(1), 0.9))).unwrap();
        assert_eq!(s["source"], "scored");
        assert!(s.get("reason").is_none());
    }
}
