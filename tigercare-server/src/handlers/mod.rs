pub mod health;
pub mod proxy;
pub mod records;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use serde_json::{json, Value};
use tigercare_client::{ClientError, FhirClient};

use crate::AppState;

/// Error half of every handler result: status plus `{"error": ...}`
pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn require_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    bearer_token(headers).ok_or_else(|| {
        tracing::error!("No authorization token provided");
        api_error(StatusCode::UNAUTHORIZED, "Authorization token required")
    })
}

pub fn require_client(state: &AppState) -> Result<&FhirClient, ApiError> {
    state.fhir.as_ref().ok_or_else(|| {
        tracing::error!("FHIR service URL not configured");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "FHIR service URL not configured",
        )
    })
}

/// Upstream status and body are passed through; anything else is a 500
pub fn upstream_error(err: ClientError) -> ApiError {
    match (err.status(), err.body()) {
        (Some(status), Some(body)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            api_error(status, body)
        }
        _ => {
            tracing::error!(error = %err, "Error handling FHIR request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "details": err.to_string() })),
            )
        }
    }
}
