//! Session cookie verification
//!
//! The portal issues an HS256 JWT in the `session_token` cookie at sign-in.
//! Requests under a protected prefix must carry a cookie that verifies
//! against the configured secret.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tigercare_core::OperationOutcome;

use crate::AppState;

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// All values of the named cookie across every Cookie header, in order
pub fn cookie_values(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(|c| c.ok())
        .filter(|c| c.name() == name)
        .map(|c| c.value_trimmed().to_string())
        .collect()
}

/// Verify an HS256 session token
pub fn verify_session(
    token: &str,
    secret: &str,
) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    // exp is checked when present, but not required
    validation.required_spec_claims.clear();

    let data: TokenData<SessionClaims> = jsonwebtoken::decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Domain for a re-issued session cookie: the forwarded host, unless the
/// request came in on localhost
fn cookie_domain(headers: &HeaderMap) -> Option<String> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    if host.contains("localhost") {
        return None;
    }
    headers
        .get("x-forwarded-host")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(':').next())
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

fn session_cookie(name: &str, value: &str, domain: Option<String>) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), value.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax);
    if let Some(domain) = domain {
        builder = builder.domain(domain);
    }
    builder.build()
}

/// Expired, empty session cookie
pub fn removal_cookie(name: &str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.to_string(), ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}

/// Session middleware for protected paths
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let path = request.uri().path().to_string();
    if !state.config.is_protected(&path) {
        return Ok(next.run(request).await);
    }

    let settings = &state.config.session;
    let tokens = cookie_values(request.headers(), &settings.cookie_name);

    // The most recent cookie wins when the browser sends duplicates
    let Some(token) = tokens.last().cloned() else {
        tracing::info!(path = %path, "No session token");
        let outcome = OperationOutcome::unauthorized("No session token");
        return Err((StatusCode::UNAUTHORIZED, Json(outcome)).into_response());
    };
    let duplicates = tokens.len() > 1;

    let Some(secret) = settings.jwt_secret.as_deref() else {
        tracing::error!("Session secret is not configured");
        let outcome = OperationOutcome::exception("configuration_error");
        return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(outcome)).into_response());
    };

    let claims = match verify_session(&token, secret) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Session token verification failed");
            let outcome = OperationOutcome::unauthorized(format!("Invalid session: {}", e));
            let jar = CookieJar::new().add(removal_cookie(&settings.cookie_name));
            return Err((StatusCode::UNAUTHORIZED, jar, Json(outcome)).into_response());
        }
    };

    tracing::debug!(
        path = %path,
        sub = claims.sub.as_deref().unwrap_or(""),
        "Session verified"
    );
    let domain = cookie_domain(request.headers());
    request.extensions_mut().insert(claims);

    let response = next.run(request).await;
    if !duplicates {
        return Ok(response);
    }
    tracing::info!(path = %path, count = tokens.len(), "Replacing duplicate session cookies");
    let jar = CookieJar::new().add(session_cookie(&settings.cookie_name, &token, domain));
    Ok((jar, response).into_response())
}

/// POST /api/auth/signout
pub async fn sign_out(State(state): State<Arc<AppState>>) -> (CookieJar, Redirect) {
    tracing::info!("Signing out");
    let jar = CookieJar::new().add(removal_cookie(&state.config.session.cookie_name));
    (jar, Redirect::to("/"))
}

/// GET /api/auth/check
pub async fn auth_check(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<Value> {
    let settings = &state.config.session;
    let Some(token) = cookie_values(&headers, &settings.cookie_name).pop() else {
        return Json(json!({ "isAuthenticated": false }));
    };

    let Some(secret) = settings.jwt_secret.as_deref() else {
        tracing::warn!("Session secret is not configured; reporting unauthenticated");
        return Json(json!({ "isAuthenticated": false }));
    };

    match verify_session(&token, secret) {
        Ok(claims) => Json(json!({ "isAuthenticated": true, "user": claims })),
        Err(_) => Json(json!({ "isAuthenticated": false })),
    }
}
