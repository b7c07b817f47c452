//! tigercare-server entry point

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tigercare_server::{build_router, config::ServerConfig, AppState};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = ServerConfig::load(
        std::path::Path::new("config.yaml")
            .exists()
            .then_some("config.yaml"),
    );

    let level = config
        .as_ref()
        .map(|c| c.log.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    tracing::info!("Starting tigercare-server...");

    let config = config.unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        ServerConfig::default()
    });

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    match &state.fhir {
        Some(client) => tracing::info!(
            "FHIR service: {} (max {} entries per transaction)",
            client.base_url(),
            client.config().max_entries_per_bundle
        ),
        None => tracing::warn!("FHIR service URL not configured; /api/fhir routes will fail"),
    }

    if state.config.session.jwt_secret.is_none() {
        tracing::warn!("JWT secret not set; protected routes will answer 500");
    }

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Server error: {}", e);
        });

    tracing::info!("Server shut down gracefully");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
