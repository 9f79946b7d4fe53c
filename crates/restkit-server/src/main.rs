//! Restkit Server - demo entry point
//!
//! Serves `/health` and the `items` resource under `/api/v1`.

use anyhow::Result;
use restkit_common::logging::{init_logging, LogConfig};
use tracing::info;

use restkit_server::{
    api,
    config::Config,
    db::{self, registry::{ConnectionRegistry, DEFAULT_ALIAS}},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("restkit-server")
        .filter_directives("restkit_server=debug,restkit::audit=info,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting Restkit Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let registry = ConnectionRegistry::new();
    let pool = registry.connect(DEFAULT_ALIAS, &config.database).await?;
    info!("Database connection pool established");

    db::migrate(&pool).await?;

    api::serve(config, registry).await?;

    Ok(())
}
