//! Residual-value estimate: exponential decay of the original value, with a
//! yearly rate adjusted for condition and usage.

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{number_field, round2, text_field};
use crate::result::Estimate;

pub const BASE_RATE: f64 = 0.1;
pub const DEFAULT_ORIGINAL_VALUE: f64 = 10_000.0;
pub const MIN_CONFIDENCE: f64 = 0.6;
pub const CONFIDENCE_LOSS_PER_YEAR: f64 = 0.05;

pub const RECOMMENDATIONS: [&str; 3] = [
    "Consider professional appraisal for high-value assets",
    "Regular maintenance can help preserve residual value",
    "Market conditions may affect actual residual value",
];

pub fn condition_multiplier(condition: &str) -> f64 {
    match condition {
        "excellent" => 0.7,
        "good" => 0.9,
        "fair" => 1.2,
        "poor" => 1.5,
        _ => 1.0,
    }
}

pub fn usage_multiplier(usage: &str) -> f64 {
    match usage {
        "light" => 0.8,
        "moderate" => 1.0,
        "heavy" => 1.3,
        _ => 1.0,
    }
}

/// Normalised questionnaire answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualInput {
    pub age: f64,
    pub condition: String,
    pub usage: String,
    pub original_value: f64,
}

impl ResidualInput {
    /// Missing, zero or malformed answers take the defaults: age 0, condition
    /// `good`, usage `moderate`, original value 10000.
    pub fn from_form(data: &JsonValue) -> Self {
        Self {
            age: number_field(data, "age").filter(|a| *a > 0.0).unwrap_or(0.0),
            condition: text_field(data, "condition").unwrap_or("good").to_string(),
            usage: text_field(data, "usage").unwrap_or("moderate").to_string(),
            original_value: number_field(data, "originalValue")
                .filter(|v| *v != 0.0)
                .unwrap_or(DEFAULT_ORIGINAL_VALUE),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Factors {
    pub age: f64,
    pub condition: String,
    pub usage: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualEstimate {
    pub calculated_residual_value: i64,
    pub depreciation_rate: f64,
    pub confidence: f64,
    pub factors: Factors,
    pub recommendations: Vec<&'static str>,
}

pub fn calculate(input: &ResidualInput) -> ResidualEstimate {
    let rate = BASE_RATE * condition_multiplier(&input.condition) * usage_multiplier(&input.usage);
    let residual = input.original_value * (1.0 - rate).powf(input.age);
    let confidence = (1.0 - input.age * CONFIDENCE_LOSS_PER_YEAR).max(MIN_CONFIDENCE);

    ResidualEstimate {
        calculated_residual_value: residual.round() as i64,
        depreciation_rate: round2(rate),
        confidence: round2(confidence),
        factors: Factors {
            age: input.age,
            condition: input.condition.clone(),
            usage: input.usage.clone(),
        },
        recommendations: RECOMMENDATIONS.to_vec(),
    }
}

pub fn estimate(data: &JsonValue) -> Estimate {
    let out = calculate(&ResidualInput::from_form(data));
    let confidence = out.confidence;
    Estimate::new(serde_json::to_value(out).unwrap_or(JsonValue::Null), confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn five_year_old_good_moderate_asset() {
        let out = calculate(&ResidualInput::from_form(&json!({
            "age": 5, "condition": "good", "usage": "moderate", "originalValue": 10000
        })));
        assert_eq!(out.calculated_residual_value, (10000.0 * 0.91f64.powi(5)).round() as i64);
        assert_eq!(out.calculated_residual_value, 6240);
        assert_eq!(out.confidence, 0.75);
        assert_eq!(out.depreciation_rate, 0.09);
    }

    #[test]
    fn empty_form_uses_defaults() {
        let input = ResidualInput::from_form(&json!({}));
        assert_eq!(input.age, 0.0);
        assert_eq!(input.condition, "good");
        assert_eq!(input.usage, "moderate");
        assert_eq!(input.original_value, DEFAULT_ORIGINAL_VALUE);

        let out = calculate(&input);
        assert_eq!(out.calculated_residual_value, 10_000);
        assert_eq!(out.confidence, 1.0);
    }

    #[test]
    fn zero_original_value_is_treated_as_missing() {
        let input = ResidualInput::from_form(&json!({"originalValue": 0, "age": "2"}));
        assert_eq!(input.original_value, DEFAULT_ORIGINAL_VALUE);
        assert_eq!(input.age, 2.0);
    }

    #[test]
    fn confidence_floors_at_minimum() {
        let out = calculate(&ResidualInput::from_form(&json!({"age": 30, "condition": "poor", "usage": "heavy"})));
        assert_eq!(out.confidence, MIN_CONFIDENCE);
        assert!(out.calculated_residual_value < 10_000);
    }

    #[test]
    fn unknown_condition_and_usage_leave_base_rate() {
        assert_eq!(condition_multiplier("mint"), 1.0);
        assert_eq!(usage_multiplier("constant"), 1.0);
        let out = calculate(&ResidualInput::from_form(&json!({"condition": "mint", "usage": "constant"})));
        assert_eq!(out.depreciation_rate, 0.1);
    }

    #[test]
    fn estimate_serializes_camel_case() {
        let e = estimate(&json!({"age": 1}));
        assert_eq!(e.result["factors"]["condition"], "good");
        assert_eq!(e.result["recommendations"].as_array().unwrap().len(), 3);
        assert!(e.result.get("calculatedResidualValue").is_some());
    }
}
