//! Request and session configuration from TOML (`[request]`, `[session]`)

use conductor_application::{RequestParams, SessionParams};
use conductor_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw request configuration from TOML
///
/// # Example
///
/// ```toml
/// [request]
/// max_prompt_chars = 120000
/// max_response_chars = 200000
/// max_retries = 3
/// base_delay_ms = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRequestConfig {
    pub max_prompt_chars: usize,
    pub max_response_chars: usize,
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for FileRequestConfig {
    fn default() -> Self {
        let params = RequestParams::default();
        Self {
            max_prompt_chars: params.max_prompt_chars,
            max_response_chars: params.max_response_chars,
            max_retries: params.max_retries,
            base_delay_ms: params.base_delay.as_millis() as u64,
        }
    }
}

impl FileRequestConfig {
    pub fn to_request_params(&self) -> RequestParams {
        RequestParams::default()
            .with_max_prompt_chars(self.max_prompt_chars)
            .with_max_response_chars(self.max_response_chars)
            .with_max_retries(self.max_retries)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_retries == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::RetriesDisabled,
                "request.max_retries is 0: transient failures will not be retried",
            ));
        }
        for (field, value) in [
            ("request.max_prompt_chars", self.max_prompt_chars),
            ("request.max_response_chars", self.max_response_chars),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::OutOfRange {
                        field: field.to_string(),
                        value: 0,
                        applied: 0,
                    },
                    format!("{field}: must be greater than 0"),
                ));
            }
        }
        issues
    }
}

/// Raw session configuration from TOML
///
/// # Example
///
/// ```toml
/// [session]
/// inactivity_timeout_secs = 120   # 0 disables
/// absolute_timeout_secs = 900     # 0 disables
/// copilot_command = "copilot"
/// excluded_tools = ["web_fetch"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    pub inactivity_timeout_secs: u64,
    pub absolute_timeout_secs: u64,
    /// Copilot CLI executable
    pub copilot_command: String,
    /// Restrict sessions to these tools (empty: service default)
    pub available_tools: Vec<String>,
    pub excluded_tools: Vec<String>,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        let params = SessionParams::default();
        let secs = |d: Option<Duration>| d.map(|d| d.as_secs()).unwrap_or(0);
        Self {
            inactivity_timeout_secs: secs(params.inactivity_timeout),
            absolute_timeout_secs: secs(params.absolute_timeout),
            copilot_command: "copilot".to_string(),
            available_tools: Vec::new(),
            excluded_tools: Vec::new(),
        }
    }
}

impl FileSessionConfig {
    pub fn to_session_params(&self) -> SessionParams {
        SessionParams::from_secs(self.inactivity_timeout_secs, self.absolute_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_to_params() {
        assert_eq!(
            FileRequestConfig::default().to_request_params(),
            RequestParams::default()
        );
        assert_eq!(
            FileSessionConfig::default().to_session_params(),
            SessionParams::default()
        );
    }

    #[test]
    fn test_zero_timeout_disables_bound() {
        let config = FileSessionConfig {
            inactivity_timeout_secs: 0,
            ..Default::default()
        };
        let params = config.to_session_params();
        assert_eq!(params.inactivity_timeout, None);
        assert!(params.absolute_timeout.is_some());
    }

    #[test]
    fn test_request_validation() {
        assert!(FileRequestConfig::default().validate().is_empty());

        let config = FileRequestConfig {
            max_retries: 0,
            max_prompt_chars: 0,
            ..Default::default()
        };
        let issues = config.validate();
        assert_eq!(issues.len(), 2);
        assert!(ConfigIssue::has_errors(&issues));
    }
}
