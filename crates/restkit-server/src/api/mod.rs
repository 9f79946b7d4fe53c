//! HTTP application assembly
//!
//! [`create_app`] builds the full axum application: the route table mounted
//! through a [`Dispatcher`], plus CORS, tracing and request-audit layers.
//! [`serve`] binds it and runs until a shutdown signal arrives.

pub mod response;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use tokio::signal;
use tower_http::compression::CompressionLayer;

use crate::audit::{self, AuditSink, RequestLogLayer};
use crate::config::Config;
use crate::context::{ContextPool, RequestContext};
use crate::db::{self, registry::ConnectionRegistry};
use crate::error::RestResult;
use crate::features;
use crate::middleware;
use crate::router::{ContextHandler, Dispatcher, Routes};
use response::Reply;

pub const API_PREFIX: &str = "/api/v1";

/// `GET /health`: reports database reachability and context pool usage
pub struct HealthCheck {
    registry: ConnectionRegistry,
    pool: Arc<ContextPool>,
}

impl HealthCheck {
    pub fn new(registry: ConnectionRegistry, pool: Arc<ContextPool>) -> Self {
        Self { registry, pool }
    }
}

#[async_trait]
impl ContextHandler for HealthCheck {
    async fn call(&self, _ctx: &mut RequestContext) -> RestResult {
        let database = match self.registry.default_pool() {
            Ok(pool) => match db::health_check(&pool).await {
                Ok(()) => "ok",
                Err(e) => {
                    tracing::warn!(error = %e, "Database health check failed");
                    "unavailable"
                },
            },
            Err(_) => "not configured",
        };

        Ok(Reply::success(json!({
            "status": "running",
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
            "context_pool": self.pool.stats(),
        })))
    }
}

/// Build the dispatcher from request settings
pub fn create_dispatcher(
    config: &Config,
    audit: Arc<dyn AuditSink>,
) -> anyhow::Result<Dispatcher> {
    let request = &config.request;
    let pool = if request.pool_enabled {
        ContextPool::new(request.pool_max_idle)
    } else {
        ContextPool::disabled()
    };

    Ok(Dispatcher::new(pool, request.query_rules()?, audit).with_body_limit(request.max_body_bytes))
}

/// Assemble routes and middleware into the application router
pub fn create_app(
    config: &Config,
    registry: &ConnectionRegistry,
    audit: Arc<dyn AuditSink>,
) -> anyhow::Result<Router> {
    let dispatcher = create_dispatcher(config, audit.clone())?;
    let pool = registry.default_pool()?;

    let routes = Routes::new()
        .get("/health", HealthCheck::new(registry.clone(), dispatcher.pool().clone()))
        .nest(API_PREFIX, features::routes(pool));

    Ok(routes
        .into_router(dispatcher)
        .layer(CompressionLayer::new())
        .layer(RequestLogLayer::new(audit))
        .layer(middleware::cors_layer(&config.cors))
        .layer(middleware::tracing_layer()))
}

/// Serve the application until SIGINT/SIGTERM
pub async fn serve(config: Config, registry: ConnectionRegistry) -> anyhow::Result<()> {
    let audit = audit::sink_from_config(&config.request.audit)?;
    let app = create_app(&config, &registry, audit)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Draining database pools");
    let drain = registry.close_all();
    if tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout_secs), drain)
        .await
        .is_err()
    {
        tracing::warn!("Timed out waiting for database pools to close");
    }

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
