use serde_json::{Value as JsonValue, json};

use super::{HEURISTIC_CONFIDENCE, number_field};
use crate::result::Estimate;

/// Canned risk/trend/maintenance/depreciation profile scaled by the asset value.
pub fn estimate(asset: &JsonValue) -> Estimate {
    let value = number_field(asset, "value").unwrap_or(0.0);
    let analysis = json!({
        "riskAssessment": {
            "level": "medium",
            "factors": ["age", "condition", "market_volatility"],
            "score": 0.6,
            "recommendations": ["Regular maintenance", "Insurance review"],
        },
        "valueTrend": {
            "trend": "stable",
            "projectedValue": value * 0.8,
            "timeframe": "12 months",
        },
        "maintenanceRecommendations": [
            "Schedule regular inspections",
            "Update maintenance records",
            "Consider preventive maintenance",
        ],
        "depreciationAnalysis": {
            "method": "straight_line",
            "annualRate": 0.1,
            "currentValue": value * 0.9,
        },
    });
    Estimate::new(analysis, HEURISTIC_CONFIDENCE)
}
