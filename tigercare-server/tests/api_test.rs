//! Route tests for the portal API
//!
//! Requests are driven through the router with `oneshot`; the upstream FHIR
//! service is an axum mock bound to a random port.

use axum::{
    body::{to_bytes, Body},
    extract::{Query, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tigercare_server::{build_router, config::ServerConfig, AppState};
use tower::ServiceExt;

const SECRET: &str = "test-session-secret";
const TOKEN: &str = "fhir-access-token";
const BOUNDARY: &str = "tigercare-boundary";

#[derive(Default)]
struct Upstream {
    transaction_calls: AtomicUsize,
    xml_calls: AtomicUsize,
}

async fn upstream_root(
    State(state): State<Arc<Upstream>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.contains("xml") {
        state.xml_calls.fetch_add(1, Ordering::SeqCst);
        return Json(json!({"resourceType": "Patient", "id": "from-xml"})).into_response();
    }

    state.transaction_calls.fetch_add(1, Ordering::SeqCst);
    let bundle: Value = serde_json::from_str(&body).unwrap();
    let entries: Vec<Value> = bundle["entry"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .map(|_| json!({"response": {"status": "201 Created"}}))
                .collect()
        })
        .unwrap_or_default();
    Json(json!({
        "resourceType": "Bundle",
        "type": "transaction-response",
        "entry": entries
    }))
    .into_response()
}

async fn upstream_search(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    Json(json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": 1,
        "entry": [{"resource": {"resourceType": "Patient", "id": "p1"}}],
        "echo": {"authorization": auth, "name": params.get("name")}
    }))
    .into_response()
}

async fn upstream_missing() -> Response {
    (StatusCode::NOT_FOUND, "Resource Patient/missing not found").into_response()
}

async fn upstream_create(Json(mut body): Json<Value>) -> Response {
    body["id"] = json!("created-1");
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn start_upstream() -> (String, Arc<Upstream>) {
    let state = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/", post(upstream_root))
        .route("/Patient", get(upstream_search).post(upstream_create))
        .route("/Bundle", post(upstream_create))
        .route("/Patient/missing", get(upstream_missing))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn router_with(service_url: Option<String>) -> Router {
    let mut config = ServerConfig::default();
    config.fhir.service_url = service_url;
    config.session.jwt_secret = Some(SECRET.to_string());
    build_router(Arc::new(AppState::new(config).unwrap()))
}

fn session_token(sub: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &json!({"sub": sub, "email": "jane@example.com", "exp": 4_102_444_800u64}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn multipart_body(format: &str, file: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"format\"\r\n\r\n{format}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n{file}\r\n--{b}--\r\n",
        b = BOUNDARY
    )
}

fn upload_request(cookie: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/users/user-1/records")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN));
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = router_with(None);
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "ok");
}

#[tokio::test]
async fn test_proxy_requires_bearer() {
    let (url, _) = start_upstream().await;
    let app = router_with(Some(url));
    let resp = app
        .oneshot(Request::get("/api/fhir/Patient").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "Authorization token required");
}

#[tokio::test]
async fn test_proxy_without_service_url() {
    let app = router_with(None);
    let resp = app
        .oneshot(
            Request::get("/api/fhir/Patient")
                .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await["error"], "FHIR service URL not configured");
}

#[tokio::test]
async fn test_proxy_get_forwards_query_and_token() {
    let (url, _) = start_upstream().await;
    let app = router_with(Some(format!("{}/", url)));
    let resp = app
        .oneshot(
            Request::get("/api/fhir/Patient?name=Jane")
                .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["resourceType"], "Bundle");
    assert_eq!(body["echo"]["authorization"], format!("Bearer {}", TOKEN));
    assert_eq!(body["echo"]["name"], "Jane");
}

#[tokio::test]
async fn test_proxy_passes_upstream_errors_through() {
    let (url, _) = start_upstream().await;
    let app = router_with(Some(url));
    let resp = app
        .oneshot(
            Request::get("/api/fhir/Patient/missing")
                .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["error"], "Resource Patient/missing not found");
}

#[tokio::test]
async fn test_proxy_post_validates_bundle() {
    let (url, _) = start_upstream().await;
    let app = router_with(Some(url));

    let resp = app
        .clone()
        .oneshot(
            Request::post("/api/fhir/Bundle")
                .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                .header(header::CONTENT_TYPE, "application/fhir+json")
                .body(Body::from(json!({"resourceType": "Patient"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "Resource must be a FHIR Bundle");

    let resp = app
        .oneshot(
            Request::post("/api/fhir/Bundle")
                .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                .header(header::CONTENT_TYPE, "application/fhir+json")
                .body(Body::from(
                    json!({"resourceType": "Bundle", "type": "collection"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["id"], "created-1");
}

#[tokio::test]
async fn test_upload_requires_session() {
    let (url, _) = start_upstream().await;
    let app = router_with(Some(url));
    let resp = app
        .oneshot(upload_request(None, multipart_body("json", "{}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["resourceType"], "OperationOutcome");
}

#[tokio::test]
async fn test_invalid_session_clears_cookie() {
    let (url, _) = start_upstream().await;
    let app = router_with(Some(url));
    let resp = app
        .oneshot(upload_request(
            Some("session_token=forged.token.value"),
            multipart_body("json", "{}"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("session_token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_upload_large_transaction_is_chunked() {
    let (url, upstream) = start_upstream().await;
    let app = router_with(Some(url));

    let entries: Vec<Value> = (0..450)
        .map(|i| {
            json!({
                "resource": {"resourceType": "Observation", "id": format!("o{}", i)},
                "request": {"method": "PUT", "url": format!("Observation/o{}", i)}
            })
        })
        .collect();
    let bundle = json!({"resourceType": "Bundle", "type": "transaction", "entry": entries});
    let cookie = format!("session_token={}", session_token("user-1"));

    let resp = app
        .oneshot(upload_request(
            Some(&cookie),
            multipart_body("json", &bundle.to_string()),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["type"], "transaction-response");
    assert_eq!(body["entry"].as_array().unwrap().len(), 450);
    assert_eq!(upstream.transaction_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_upload_single_resource() {
    let (url, upstream) = start_upstream().await;
    let app = router_with(Some(url));
    let cookie = format!("session_token={}", session_token("user-1"));

    let resp = app
        .oneshot(upload_request(
            Some(&cookie),
            multipart_body("json", r#"{"resourceType":"Patient","gender":"female"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["id"], "created-1");
    assert_eq!(body["gender"], "female");
    assert_eq!(upstream.transaction_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upload_rejects_bad_documents() {
    let (url, upstream) = start_upstream().await;
    let app = router_with(Some(url));
    let cookie = format!("session_token={}", session_token("user-1"));

    let cases = [
        ("json", r#"{"id":"no-type"}"#, "Invalid FHIR resource: missing resourceType"),
        ("xml", "<Patient/>", "Invalid FHIR XML: missing FHIR namespace"),
        ("csv", "a,b", "Unsupported format"),
    ];
    for (format, file, expected) in cases {
        let resp = app
            .clone()
            .oneshot(upload_request(Some(&cookie), multipart_body(format, file)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "format {}", format);
        assert_eq!(json_body(resp).await["error"], expected);
    }
    assert_eq!(upstream.xml_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upload_xml_is_forwarded_raw() {
    let (url, upstream) = start_upstream().await;
    let app = router_with(Some(url));
    // duplicate cookies: the last one is used
    let cookie = format!("session_token=stale; session_token={}", session_token("user-1"));

    let resp = app
        .oneshot(upload_request(
            Some(&cookie),
            multipart_body("xml", r#"<Patient xmlns="http://hl7.org/fhir"><gender value="female"/></Patient>"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::SET_COOKIE).is_some());
    assert_eq!(json_body(resp).await["id"], "from-xml");
    assert_eq!(upstream.xml_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_upload_missing_file() {
    let (url, _) = start_upstream().await;
    let app = router_with(Some(url));
    let cookie = format!("session_token={}", session_token("user-1"));
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"format\"\r\n\r\njson\r\n--{b}--\r\n",
        b = BOUNDARY
    );

    let resp = app.oneshot(upload_request(Some(&cookie), body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "No file provided");
}

#[tokio::test]
async fn test_auth_check() {
    let app = router_with(None);

    let resp = app
        .clone()
        .oneshot(Request::get("/api/auth/check").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(resp).await["isAuthenticated"], false);

    let resp = app
        .oneshot(
            Request::get("/api/auth/check")
                .header(header::COOKIE, format!("session_token={}", session_token("user-9")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["isAuthenticated"], true);
    assert_eq!(body["user"]["sub"], "user-9");
    assert_eq!(body["user"]["email"], "jane@example.com");
}

#[tokio::test]
async fn test_duplicate_cookies_reissued_for_forwarded_host() {
    let (url, _) = start_upstream().await;
    let app = router_with(Some(url));
    let cookie = format!("session_token=stale; session_token={}", session_token("user-1"));

    let mut request = upload_request(
        Some(&cookie),
        multipart_body("json", r#"{"resourceType": "Patient"}"#),
    );
    request
        .headers_mut()
        .insert(header::HOST, "internal:3000".parse().unwrap());
    request
        .headers_mut()
        .insert("x-forwarded-host", "portal.example.com:443".parse().unwrap());

    let resp = app.oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with(&format!("session_token={};", session_token("user-1"))));
    assert!(set_cookie.contains("Domain=portal.example.com"));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_sign_out_clears_session_cookie() {
    let app = router_with(None);
    let resp = app
        .oneshot(
            Request::post("/api/auth/signout")
                .header(header::COOKIE, format!("session_token={}", session_token("user-1")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("session_token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    assert!(set_cookie.contains("Path=/"));
}
