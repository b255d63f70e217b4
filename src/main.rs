use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenv::dotenv;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use tourbook_backend::api::{self, AppState};
use tourbook_backend::config::AppConfig;
use tourbook_backend::database::booking_repository::PgBookingLedger;
use tourbook_backend::database::init_pool_from_config;
use tourbook_backend::database::tour_catalog::PgTourCatalog;
use tourbook_backend::health::{self, HealthChecker};
use tourbook_backend::logging::init_tracing;
use tourbook_backend::middleware::auth::JwtVerifier;
use tourbook_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use tourbook_backend::payments::providers::stripe::StripeGateway;
use tourbook_backend::services::ReconciliationEngine;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting tour booking backend"
    );

    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!(e)
    })?;

    // Fails fast on missing processor secrets.
    let gateway = StripeGateway::from_env().map_err(|e| {
        error!("Failed to initialize payment gateway: {}", e);
        anyhow::anyhow!(e)
    })?;

    let engine = Arc::new(ReconciliationEngine::new(
        Arc::new(PgBookingLedger::new(db_pool.clone())),
        Arc::new(PgTourCatalog::new(db_pool.clone())),
        Arc::new(gateway),
    ));
    let verifier = JwtVerifier::new(config.auth.jwt_secret.as_bytes());

    let app = Router::new()
        .merge(health::router(HealthChecker::new(db_pool)))
        .merge(api::router(AppState { engine, verifier }))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
