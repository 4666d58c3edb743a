//! Structured JSON logging with PII redaction and optional remote export

mod layer;
mod redact;
mod remote;

pub use layer::JsonLogLayer;
pub use redact::{mask_pii, PII_FIELDS, REDACTED, REQUEST_BODY, RESPONSE_BODY};
pub use remote::{RemoteSink, RemoteSinkConfig, SINK_TARGET};

use crate::config::Config;
use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose chatter is capped at `warn` unless `RUST_LOG` says otherwise
const QUIET_TARGETS: [&str; 5] = ["tower_http", "hyper", "reqwest", "mongodb", "h2"];

/// Level filter from `RUST_LOG`, falling back to the configured level
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = std::iter::once(level.to_string())
        .chain(QUIET_TARGETS.iter().map(|t| format!("{}=warn", t)))
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::try_new(&directives).with_context(|| format!("Invalid LOG_LEVEL: {}", level))
}

/// Install the global subscriber: JSON lines on stdout, plus the remote sink
/// when one is configured. Must be called from within a Tokio runtime.
pub fn init(config: &Config) -> Result<()> {
    let remote = config.log_sink_url.as_ref().map(|url| {
        let mut sink_config = RemoteSinkConfig::new(url.clone());
        sink_config.batch_size = config.log_sink_batch_size;
        sink_config.flush_interval = config.log_sink_flush_interval;
        RemoteSink::spawn(sink_config)
    });

    tracing_subscriber::registry()
        .with(env_filter(&config.log_level)?)
        .with(JsonLogLayer::new(std::io::stdout).with_remote(remote))
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}
