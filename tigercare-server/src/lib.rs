//! tigercare-server - FHIR portal backend
//!
//! Session-checked HTTP surface in front of an upstream FHIR service:
//! a bearer-token proxy and a record upload that chunks large
//! transaction bundles.

pub mod config;
pub mod handlers;
pub mod session;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tigercare_client::FhirClient;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Largest accepted request body (uploads included)
const BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Application state
pub struct AppState {
    pub config: config::ServerConfig,
    /// `None` when no FHIR service URL is configured
    pub fhir: Option<FhirClient>,
}

impl AppState {
    /// Build the state, constructing the FHIR client from the config
    pub fn new(config: config::ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let fhir = match config.fhir_client_config()? {
            Some(client_config) => Some(FhirClient::new(client_config)?),
            None => None,
        };
        Ok(Self { config, fhir })
    }
}

/// Build the application router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/auth/check", get(session::auth_check))
        .route("/api/auth/signout", post(session::sign_out))
        .route(
            "/api/fhir/{*path}",
            get(handlers::proxy::forward_get).post(handlers::proxy::forward_post),
        )
        .route(
            "/api/users/{user_id}/records",
            post(handlers::records::upload_records),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
