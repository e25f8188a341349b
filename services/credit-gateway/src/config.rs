use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bot: BotConfig,
    #[serde(default)]
    pub invoice: credit_core::Config,
    #[serde(default)]
    pub feed: ton_feed::FeedConfig,
    #[serde(default)]
    pub settlement: settlement::Config,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres URL; the in-memory store is used when absent
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BotConfig {
    /// Bot handle used in invite links
    pub username: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", 4)?
            .set_default("database.max_connections", 10)?
            .set_default("bot.username", "")?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("CREDIT_GATEWAY")
                .separator("__")
                .try_parsing(true),
        );

        // Well-known variables of the bot deployment
        let overrides = [
            ("DATABASE_URL", "database.url"),
            ("PORT", "server.port"),
            ("BOT_USERNAME", "bot.username"),
            ("TON_WALLET", "settlement.wallet_address"),
            ("CREDITS_PER_TON", "settlement.credits_per_ton"),
            ("REF_BONUS_REFERRER", "settlement.referrer_bonus"),
            ("REF_BONUS_REFEREE", "settlement.referee_bonus"),
            ("TON_MIN_AMOUNT", "invoice.invoice_amount_ton"),
            ("TON_INVOICE_TTL", "invoice.invoice_ttl_seconds"),
            ("TONAPI_BASE", "feed.base_url"),
            ("TONAPI_KEY", "feed.api_key"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = env::var(var) {
                if !value.is_empty() {
                    builder = builder.set_override(key, value)?;
                }
            }
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.bot.username.trim().is_empty() {
            return Err("Bot username is required (BOT_USERNAME)".to_string());
        }

        if self.invoice.invoice_amount_ton <= rust_decimal::Decimal::ZERO {
            return Err("Invoice amount must be positive (TON_MIN_AMOUNT)".to_string());
        }

        if self.invoice.invoice_ttl_seconds <= 0 {
            return Err("Invoice TTL must be positive (TON_INVOICE_TTL)".to_string());
        }

        if self.feed.base_url.is_empty() {
            return Err("Feed base URL is required (TONAPI_BASE)".to_string());
        }

        self.settlement
            .validate()
            .map_err(|e| format!("{} (TON_WALLET, CREDITS_PER_TON, REF_BONUS_*)", e))
    }
}
