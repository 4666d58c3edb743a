//! Customer Service
//!
//! REST API for customers and their addresses

use anyhow::{Context, Result};
use customer_service::{create_router, logging, AppState, Config, MongoStore, SERVICE_NAME};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    logging::init(&config).context("Failed to initialize logging")?;

    info!(
        service = SERVICE_NAME,
        db = %config.db_name,
        remote_sink = config.log_sink_url.is_some(),
        "Starting Customer Service"
    );

    // Without storage the service is useless: fail fast
    let store = MongoStore::connect(&config.mongo_uri, &config.db_name)
        .await
        .context("Failed to initialize storage")?;

    if config.ensure_indexes {
        if let Err(e) = store.ensure_indexes().await {
            warn!(error = %e, "Could not ensure indexes; uniqueness may not be enforced");
        }
    }

    // Create router
    let app = create_router(AppState::new(store));

    // Bind and serve
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!(address = %config.api_address(), "Customer Service listening");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
