//! Configuration management for Customer Service
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// MongoDB connection URI
    pub mongo_uri: String,

    /// Database holding the `customers` collection
    pub db_name: String,

    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Default level filter when `RUST_LOG` is not set
    pub log_level: String,

    /// Remote log sink endpoint; `None` disables remote export
    pub log_sink_url: Option<String>,

    /// Events per remote sink batch
    pub log_sink_batch_size: usize,

    /// Maximum time an event waits before its batch is flushed
    pub log_sink_flush_interval: Duration,

    /// Create store indexes on startup
    pub ensure_indexes: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Config {
            mongo_uri: var("MONGO_URI", "mongodb://localhost:27017/"),

            db_name: var("DB_NAME", "customer_db"),

            api_host: var("API_HOST", "0.0.0.0"),

            api_port: var("PORT", "8081").parse().context("Invalid PORT")?,

            log_level: var("LOG_LEVEL", "info").to_lowercase(),

            log_sink_url: lookup("LOG_SINK_URL").filter(|url| !url.trim().is_empty()),

            log_sink_batch_size: var("LOG_SINK_BATCH_SIZE", "50")
                .parse()
                .context("Invalid LOG_SINK_BATCH_SIZE")?,

            log_sink_flush_interval: Duration::from_millis(
                var("LOG_SINK_FLUSH_INTERVAL_MS", "2000")
                    .parse()
                    .context("Invalid LOG_SINK_FLUSH_INTERVAL_MS")?,
            ),

            ensure_indexes: var("ENSURE_INDEXES", "true")
                .parse()
                .context("Invalid ENSURE_INDEXES (expected true/false)")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("PORT must be greater than 0");
        }

        if self.log_sink_batch_size == 0 {
            anyhow::bail!("LOG_SINK_BATCH_SIZE must be greater than 0");
        }

        if self.log_sink_flush_interval.is_zero() {
            anyhow::bail!("LOG_SINK_FLUSH_INTERVAL_MS must be greater than 0");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
