//! Configuration for the feed client

use serde::{Deserialize, Serialize};

/// Feed client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Indexer base URL
    pub base_url: String,

    /// Optional bearer token
    pub api_key: Option<String>,

    /// Events fetched per query
    pub limit: usize,

    /// Upper bound for one query, connect included (milliseconds)
    pub timeout_ms: u64,

    /// Slack applied to event timestamps on both window edges (seconds)
    pub skew_seconds: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tonapi.io/v2".to_string(),
            api_key: None,
            limit: 50,
            timeout_ms: 10_000,
            skew_seconds: 5,
        }
    }
}

impl FeedConfig {
    /// Query timeout
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let mut config = FeedConfig::default();

        if let Ok(base) = std::env::var("TONAPI_BASE") {
            config.base_url = base;
        }

        if let Ok(key) = std::env::var("TONAPI_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();
        assert_eq!(config.base_url, "https://tonapi.io/v2");
        assert_eq!(config.limit, 50);
        assert_eq!(config.timeout().as_secs(), 10);
        assert!(config.api_key.is_none());
    }
}
