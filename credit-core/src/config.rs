//! Configuration for invoices and codes

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Credit core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Amount requested per top-up invoice (TON)
    pub invoice_amount_ton: Decimal,

    /// Invoice lifetime (seconds)
    pub invoice_ttl_seconds: i64,

    /// Random bytes per invoice code
    pub code_bytes: usize,

    /// Attempts at drawing a fresh code before giving up
    pub code_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            invoice_amount_ton: Decimal::new(1, 1), // 0.1 TON
            invoice_ttl_seconds: 900,               // 15 minutes
            code_bytes: 3,
            code_attempts: 5,
        }
    }
}

impl Config {
    /// Invoice lifetime
    pub fn invoice_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.invoice_ttl_seconds)
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

        if let Ok(amount) = std::env::var("TON_MIN_AMOUNT") {
            config.invoice_amount_ton = amount
                .parse()
                .map_err(|e| crate::Error::Config(format!("TON_MIN_AMOUNT: {}", e)))?;
        }

        if let Ok(ttl) = std::env::var("TON_INVOICE_TTL") {
            config.invoice_ttl_seconds = ttl
                .parse()
                .map_err(|e| crate::Error::Config(format!("TON_INVOICE_TTL: {}", e)))?;
        }

        Ok(config)
    }
}
