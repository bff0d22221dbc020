// src/main.rs

//! # Badge Registry - API Server Entry Point
//!
//! Loads configuration, opens the registry directory and serves the badge API.
//!
//! ## Environment Variables
//! - `PORT`: listen port (default: 3000)
//! - `BADGE_HMAC_SECRET`: (Optional) signing secret, at least 16 bytes
//! - `REGISTRY_DIR`: (Optional) registry directory (default: ./registry)
//! - `RUST_LOG`: (Optional) log filter (default: info)

use anyhow::Context;
use badge_registry::{build_services, ApiServer, AppConfig};
use dotenv::dotenv;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load `.env` and initialise logging
/// 2. Load and validate configuration
/// 3. Build the issuance and verification services
/// 4. Start the API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let addr = config.socket_addr()?;

    let (issuer, verifier) = build_services(&config).with_context(|| {
        format!("failed to open registry at {}", config.registry_dir.display())
    })?;
    log::info!("registry directory: {}", config.registry_dir.display());

    let api_server = ApiServer::new(issuer, verifier);
    log::info!("Available endpoints:");
    log::info!("- POST /issue");
    log::info!("- GET  /verify/:id");
    log::info!("- GET  /verify/:id/signature");

    api_server
        .run(addr)
        .await
        .with_context(|| format!("failed to serve on {}", addr))
}
