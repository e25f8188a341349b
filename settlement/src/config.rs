//! Configuration for the reconciliation engine

use serde::{Deserialize, Serialize};

/// Reconciliation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service wallet that receives top-ups
    pub wallet_address: String,

    /// Credits granted per whole TON received
    pub credits_per_ton: i64,

    /// Bonus for the referrer when a referee's first top-up settles
    pub referrer_bonus: i64,

    /// Bonus for the referee on that same top-up
    pub referee_bonus: i64,

    /// Tolerance around the invoice lifetime (seconds)
    pub grace_seconds: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wallet_address: String::new(),
            credits_per_ton: 100,
            referrer_bonus: 20,
            referee_bonus: 10,
            grace_seconds: 60,
        }
    }
}

impl Config {
    /// Grace margin
    pub fn grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.grace_seconds)
    }

    /// Reject configurations that cannot settle anything
    pub fn validate(&self) -> crate::Result<()> {
        if self.wallet_address.trim().is_empty() {
            return Err(crate::Error::Config("wallet_address is required".to_string()));
        }
        if self.credits_per_ton < 0 || self.referrer_bonus < 0 || self.referee_bonus < 0 {
            return Err(crate::Error::Config(
                "credit rate and bonuses must not be negative".to_string(),
            ));
        }
        if self.grace_seconds < 0 {
            return Err(crate::Error::Config("grace_seconds must not be negative".to_string()));
        }
        Ok(())
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(wallet) = std::env::var("TON_WALLET") {
            config.wallet_address = wallet;
        }

        config.credits_per_ton = env_i64("CREDITS_PER_TON", config.credits_per_ton)?;
        config.referrer_bonus = env_i64("REF_BONUS_REFERRER", config.referrer_bonus)?;
        config.referee_bonus = env_i64("REF_BONUS_REFEREE", config.referee_bonus)?;

        Ok(config)
    }
}

fn env_i64(key: &str, default: i64) -> crate::Result<i64> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| crate::Error::Config(format!("{}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
