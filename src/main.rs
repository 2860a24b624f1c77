//! promrules server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - PROMRULES_HOST: Bind address (default: 0.0.0.0)
//! - PROMRULES_PORT: Port number (default: 3000)
//! - PROMRULES_ORG_ID: Organization of the bootstrap admin (default: 1)
//! - PROMRULES_ADMIN_USER / PROMRULES_ADMIN_PASSWORD: Bootstrap admin (default: admin/admin)
//! - PROMRULES_DEFAULT_INTERVAL_SECS: Interval of groups posted without one (default: 60)
//! - PROMRULES_PERMISSION_CACHE_TTL_SECS: Lifetime of cached permissions (default: 300)
//! - RUST_LOG: Log level (default: promrules=info,tower_http=info)

use promrules::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promrules=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    tracing::info!("promrules configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Org ID: {}", config.org_id);
    tracing::info!("  Admin user: {}", config.admin_login);
    tracing::info!(
        "  Default group interval: {} seconds",
        config.default_interval_secs
    );
    tracing::info!(
        "  Permission cache TTL: {} seconds",
        config.permission_cache_ttl_secs
    );

    run_server(config).await
}
