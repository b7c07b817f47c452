//! /api/fhir/{*path}: pass-through to the upstream FHIR service using the
//! caller's bearer token

use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use std::sync::Arc;

use super::{api_error, require_bearer, require_client, upstream_error, ApiError};
use crate::AppState;

/// GET /api/fhir/{*path}
pub async fn forward_get(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = require_bearer(&headers)?;
    let client = require_client(&state)?;

    tracing::info!(path = %path, query = query.as_deref().unwrap_or(""), "Forwarding FHIR GET");

    let data = client
        .session(token)
        .get_path(&path, query.as_deref())
        .await
        .map_err(upstream_error)?;

    tracing::info!(
        resource_type = data.get("resourceType").and_then(serde_json::Value::as_str).unwrap_or(""),
        count = result_count(&data),
        "FHIR service response successful"
    );

    Ok(Json(data).into_response())
}

/// POST /api/fhir/{*path}
pub async fn forward_post(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let token = require_bearer(&headers)?;
    let client = require_client(&state)?;

    if path == "Bundle" {
        let resource_type = body.get("resourceType").and_then(serde_json::Value::as_str);
        tracing::info!(
            resource_type = resource_type.unwrap_or(""),
            bundle_type = body.get("type").and_then(serde_json::Value::as_str).unwrap_or(""),
            entries = body.get("entry").and_then(serde_json::Value::as_array).map_or(0, Vec::len),
            "Validating Bundle"
        );
        if resource_type != Some("Bundle") {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Resource must be a FHIR Bundle",
            ));
        }
    }

    tracing::info!(
        path = %path,
        resource_type = body.get("resourceType").and_then(serde_json::Value::as_str).unwrap_or(""),
        "Forwarding FHIR POST"
    );

    let data = client
        .session(token)
        .post_path(&path, &body)
        .await
        .map_err(upstream_error)?;

    Ok(Json(data).into_response())
}

/// `total` if the server reported one, otherwise the number of entries
fn result_count(data: &Value) -> u64 {
    data.get("total")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| {
            data.get("entry")
                .and_then(serde_json::Value::as_array)
                .map_or(0, |e| e.len() as u64)
        })
}
