//! Transport NSW client configuration

use serde::{Deserialize, Serialize};

/// What to do with a departure when its vehicle position feed cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionFailurePolicy {
    /// Fail the whole departure query, so a monitor keeps its previous result
    #[default]
    AbortQuery,
    /// Keep the departure and leave its position unknown
    KeepDeparture,
}

/// Configuration for the Transport NSW open data API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportNswConfig {
    /// Base URL of the open data API (departure monitor and GTFS feeds hang off it)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout applied to each request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Behavior when the vehicle position feed request fails
    #[serde(default)]
    pub position_failure: PositionFailurePolicy,
}

fn default_base_url() -> String {
    "https://api.transport.nsw.gov.au/v1".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("transport-nsw/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for TransportNswConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            position_failure: PositionFailurePolicy::default(),
        }
    }
}

impl TransportNswConfig {
    /// Create a configuration pointing at a local mock server
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: 2,
            ..Default::default()
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base_url must not be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!("base_url must be an http(s) URL, got {}", self.base_url));
        }

        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }

        Ok(())
    }
}
