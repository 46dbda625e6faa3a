use serde_json::{Value as JsonValue, json};

use super::{HEURISTIC_CONFIDENCE, number_field};
use crate::result::Estimate;

pub fn estimate(data: &JsonValue) -> Estimate {
    let total_cost = number_field(data, "totalValue").unwrap_or(0.0);
    let insights = json!({
        "portfolioOptimization": {
            "diversification": "Good",
            "concentration": "Medium",
            "recommendations": ["Consider diversifying asset types"],
        },
        "riskMitigation": {
            "overallRisk": "Medium",
            "keyRisks": ["Market volatility", "Asset aging"],
            "mitigation": ["Regular monitoring", "Insurance coverage"],
        },
        "costOptimization": {
            "totalCost": total_cost,
            "optimization": "Consider bulk purchasing",
            "savings": "Potential 10% savings",
        },
        "performanceMetrics": {
            "utilization": "75%",
            "efficiency": "Good",
            "improvements": ["Increase utilization", "Optimize maintenance"],
        },
    });
    Estimate::new(insights, HEURISTIC_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_cost_comes_from_total_value() {
        assert_eq!(estimate(&json!({"totalValue": 2500})).result["costOptimization"]["totalCost"], 2500.0);
        assert_eq!(estimate(&json!({})).result["costOptimization"]["totalCost"], 0.0);
    }
}
