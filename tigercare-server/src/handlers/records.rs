//! POST /api/users/{user_id}/records: upload a FHIR document for a user

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tigercare_client::{ContentFormat, FhirSession};

use super::{api_error, require_client, ApiError};
use crate::AppState;

const FHIR_XML_NAMESPACE: &str = r#"xmlns="http://hl7.org/fhir""#;

/// Multipart fields of an upload
#[derive(Debug, Default)]
struct Upload {
    file_name: Option<String>,
    content: Option<String>,
    format: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.content = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?,
                );
            }
            Some("format") => {
                upload.format = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?,
                );
            }
            _ => {}
        }
    }
    Ok(upload)
}

/// Upload a JSON or XML FHIR document. JSON transaction bundles are
/// chunked and submitted in order.
pub async fn upload_records(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    tracing::info!(user_id = %user_id, "Processing FHIR upload");

    let upload = read_upload(multipart).await?;
    let Some(content) = upload.content else {
        tracing::error!("No file provided in request");
        return Err(api_error(StatusCode::BAD_REQUEST, "No file provided"));
    };
    let format = upload.format.unwrap_or_default();

    tracing::info!(
        file_name = upload.file_name.as_deref().unwrap_or(""),
        size = content.len(),
        upload_format = %format,
        "Received file"
    );

    let Some(token) = super::bearer_token(&headers) else {
        tracing::error!("Missing or invalid authorization header");
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Missing or invalid authorization token",
        ));
    };
    let client = require_client(&state)?;
    let session = client.session(token);

    let result = match format.as_str() {
        "json" => create_json(&session, &content).await,
        "xml" => create_xml(&session, content).await,
        _ => Err("Unsupported format".to_string()),
    };

    match result {
        Ok(created) => Ok(Json(created).into_response()),
        Err(message) => {
            tracing::error!(user_id = %user_id, error = %message, "FHIR validation/creation error");
            Err(api_error(StatusCode::BAD_REQUEST, message))
        }
    }
}

async fn create_json(session: &FhirSession<'_>, content: &str) -> Result<Value, String> {
    let resource: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;

    match resource.get("resourceType").and_then(serde_json::Value::as_str) {
        None => return Err("Invalid FHIR resource: missing resourceType".to_string()),
        Some("Bundle") => tracing::info!(
            bundle_type = resource.get("type").and_then(serde_json::Value::as_str).unwrap_or(""),
            entries = resource.get("entry").and_then(serde_json::Value::as_array).map_or(0, Vec::len),
            "Processing Bundle"
        ),
        Some(resource_type) => tracing::info!(
            resource_type = resource_type,
            id = resource.get("id").and_then(serde_json::Value::as_str).unwrap_or(""),
            "Processing single resource"
        ),
    }

    let created = session.create(&resource).await.map_err(|e| e.to_string())?;

    tracing::info!(
        resource_type = created.get("resourceType").and_then(serde_json::Value::as_str).unwrap_or(""),
        entries = created.get("entry").and_then(serde_json::Value::as_array).map_or(0, Vec::len),
        "Successfully created resource"
    );
    Ok(created)
}

async fn create_xml(session: &FhirSession<'_>, content: String) -> Result<Value, String> {
    // The FHIR server does the real parsing; only the namespace is checked here
    if !content.contains(FHIR_XML_NAMESPACE) {
        return Err("Invalid FHIR XML: missing FHIR namespace".to_string());
    }
    session
        .create_raw(content, ContentFormat::Xml)
        .await
        .map_err(|e| e.to_string())
}
