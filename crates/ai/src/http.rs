//! Remote scorer reached over HTTP.

use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::result::{AiError, Estimate};
use crate::scorer::{ScoreRequest, Scorer};

/// POSTs the [`ScoreRequest`] as JSON with a bearer key and expects an
/// [`Estimate`] back.
///
/// Uses the blocking client; build and drop it outside any async runtime.
pub struct HttpScorer {
    url: String,
    api_key: SecretString,
    client: Client,
}

impl std::fmt::Debug for HttpScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpScorer").field("url", &self.url).finish_non_exhaustive()
    }
}

impl HttpScorer {
    pub fn new(url: impl Into<String>, api_key: &SecretString, timeout: Duration) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::ScoringFailed(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            api_key: SecretString::from(api_key.expose_secret().to_owned()),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Scorer for HttpScorer {
    fn score(&self, request: &ScoreRequest) -> Result<Estimate, AiError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .map_err(|e| AiError::ScoringFailed(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::ScoringFailed(format!("{} answered HTTP {status}", self.url)));
        }
        let estimate: Estimate = response
            .json()
            .map_err(|e| AiError::ScoringFailed(format!("invalid scorer response: {e}")))?;
        if !(0.0..=1.0).contains(&estimate.confidence) {
            return Err(AiError::ScoringFailed(format!(
                "scorer confidence {} outside [0, 1]",
                estimate.confidence
            )));
        }
        debug!(url = %self.url, kind = %request.kind, "remote scorer answered");
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unreachable_endpoint_is_a_scoring_failure() {
        let scorer = HttpScorer::new(
            "http://127.0.0.1:9/score",
            &SecretString::from("k".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = scorer
            .score(&ScoreRequest {
                kind: "residual_value_analysis".into(),
                data: json!({}),
                asset_id: None,
                project_id: None,
            })
            .unwrap_err();
        assert!(matches!(err, AiError::ScoringFailed(ref m) if m.contains("127.0.0.1:9")));
    }

    #[test]
    fn debug_hides_the_key() {
        let scorer = HttpScorer::new(
            "http://ai.local",
            &SecretString::from("sk-live".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(!format!("{scorer:?}").contains("sk-live"));
    }
}
