//! Deterministic local estimates used when the scorer is unavailable.

pub mod asset_data;
pub mod insights;
pub mod residual;

use serde_json::Value as JsonValue;

/// Confidence reported for the canned asset-data and insights estimates.
pub const HEURISTIC_CONFIDENCE: f64 = 0.5;

/// Reads a number that may have been submitted as a JSON number or string.
pub(crate) fn number_field(data: &JsonValue, key: &str) -> Option<f64> {
    match data.get(key)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

pub(crate) fn text_field<'a>(data: &'a JsonValue, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
