//! Process configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use secrecy::SecretString;
use thiserror::Error;
use tracing::warn;

use crate::jobs::{RetryPolicy, RuntimeConfig};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// External AI scoring service.
#[derive(Debug)]
pub struct AiConfig {
    pub url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

#[derive(Debug)]
pub struct AppConfig {
    pub frontend_url: String,
    pub backend_url: String,
    pub uploads_dir: PathBuf,
    pub mail_from: String,
    /// SMTP host from `MAIL_HOST`. No SMTP transport ships in this build, so
    /// a set host only produces a startup warning.
    pub smtp_host: Option<String>,
    pub ai: Option<AiConfig>,
    pub log_format: String,
    pub jobs: RuntimeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            backend_url: "http://localhost:3000".to_string(),
            uploads_dir: PathBuf::from("uploads"),
            mail_from: "noreply@4ami.com".to_string(),
            smtp_host: None,
            ai: None,
            log_format: "json".to_string(),
            jobs: RuntimeConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset and empty keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = AppConfig::default();

        if let Some(v) = get("FRONTEND_URL") {
            config.frontend_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("BACKEND_URL") {
            config.backend_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("UPLOADS_DIR") {
            config.uploads_dir = PathBuf::from(v);
        }
        if let Some(v) = get("MAIL_FROM") {
            config.mail_from = v;
        }
        if let Some(v) = get("LOG_FORMAT") {
            config.log_format = v;
        }

        config.smtp_host = get("MAIL_HOST");

        config.ai = match (get("AI_AGENT_API_KEY"), get("AI_AGENT_URL")) {
            (Some(api_key), Some(url)) => Some(AiConfig {
                url,
                api_key: SecretString::from(api_key),
                timeout: Duration::from_secs(parse_or(
                    "AI_AGENT_TIMEOUT_SECS",
                    get("AI_AGENT_TIMEOUT_SECS"),
                    30,
                )?),
            }),
            (Some(_), None) => {
                warn!("AI_AGENT_API_KEY set without AI_AGENT_URL; AI jobs will use heuristic fallbacks");
                None
            }
            _ => {
                warn!("AI_AGENT_API_KEY/AI_AGENT_URL not set; AI jobs will use heuristic fallbacks");
                None
            }
        };

        let jobs = &mut config.jobs;
        jobs.concurrency = parse_or("JOB_CONCURRENCY", get("JOB_CONCURRENCY"), jobs.concurrency)?;
        if jobs.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "JOB_CONCURRENCY",
                value: "0".to_string(),
            });
        }
        let poll_ms = parse_or(
            "JOB_POLL_INTERVAL_MS",
            get("JOB_POLL_INTERVAL_MS"),
            jobs.poll_interval.as_millis() as u64,
        )?;
        jobs.poll_interval = Duration::from_millis(poll_ms.max(1));
        let retention_secs = parse_or("JOB_RETENTION_SECS", get("JOB_RETENTION_SECS"), jobs.retention.as_secs())?;
        jobs.retention = Duration::from_secs(retention_secs);

        let max_attempts: u32 = parse_or("JOB_MAX_ATTEMPTS", get("JOB_MAX_ATTEMPTS"), 1)?;
        jobs.retry_policy = if max_attempts <= 1 {
            RetryPolicy::no_retry()
        } else {
            RetryPolicy::exponential(max_attempts, Duration::from_secs(1), Duration::from_secs(60))
        };

        Ok(config)
    }

    pub fn verification_url(&self, token: &str) -> String {
        format!("{}/api/v1/auth/verify-email/{}", self.backend_url, encode_token(token))
    }

    pub fn reset_password_url(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.frontend_url, encode_token(token))
    }

    pub fn invitation_url(&self, code: &str) -> String {
        format!("{}/customer_signup?token={}", self.frontend_url, encode_token(code))
    }
}

/// Unreserved URL characters pass through; everything else is percent-encoded.
const TOKEN_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn encode_token(token: &str) -> String {
    utf8_percent_encode(token, TOKEN_SET).to_string()
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}
