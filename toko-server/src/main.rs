//! toko-server: storefront order and payment service
//!
//! Long-running HTTP service that:
//! - Serves the product catalog with live availability
//! - Creates orders and provider checkout transactions
//! - Reconciles payments from webhooks and status polls
//! - Delivers encrypted goods through tokenized access links

use toko_server::api;
use toko_server::core::{AppState, Config, logger};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    logger::init_logger_with_file(config.log_dir.as_deref());

    tracing::info!("Starting toko-server (env: {})", config.environment);

    let state = AppState::new(&config).await?;
    let app = api::create_router(state);

    let http_addr = format!("{}:{}", config.bind_addr, config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("toko-server listening on {http_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
