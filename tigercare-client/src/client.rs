use reqwest::{header, Method, RequestBuilder, Url};
use serde_json::Value;
use tigercare_core::{Bundle, OperationOutcome};

use crate::config::FhirClientConfig;
use crate::error::{ClientError, Result};

pub(crate) const FHIR_JSON: &str = "application/fhir+json";
pub(crate) const FHIR_XML: &str = "application/fhir+xml";

/// Body encoding for raw uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Json,
    Xml,
}

impl ContentFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentFormat::Json => FHIR_JSON,
            ContentFormat::Xml => FHIR_XML,
        }
    }
}

/// Connection to one FHIR service.
///
/// Built once from a [`FhirClientConfig`] and cloned where needed; the
/// underlying connection pool is shared between clones.
#[derive(Debug, Clone)]
pub struct FhirClient {
    http: reqwest::Client,
    base_url: String,
    config: FhirClientConfig,
}

impl FhirClient {
    pub fn new(config: FhirClientConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &FhirClientConfig {
        &self.config
    }

    /// Bind a bearer token for a sequence of calls
    pub fn session(&self, token: impl Into<String>) -> FhirSession<'_> {
        FhirSession {
            client: self,
            token: token.into(),
        }
    }

    /// `<base>/<path>`, or `<base>` itself for an empty path
    pub(crate) fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// A [`FhirClient`] paired with the bearer token of the calling user
#[derive(Clone)]
pub struct FhirSession<'a> {
    pub(crate) client: &'a FhirClient,
    token: String,
}

impl FhirSession<'_> {
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, FHIR_JSON)
    }

    /// GET /{resource_type}/{id}
    pub async fn read(&self, resource_type: &str, id: &str) -> Result<Value> {
        self.get_path(&format!("{}/{}", resource_type, id), None).await
    }

    /// GET /{resource_type}?params, decoded as a searchset Bundle
    pub async fn search(&self, resource_type: &str, params: &[(String, String)]) -> Result<Bundle> {
        let url = self.client.url(resource_type);
        let resp = self
            .request(Method::GET, &url)
            .query(params)
            .send()
            .await?;
        let value = handle_response(resp).await?;
        Ok(Bundle::from_value(value)?)
    }

    /// GET an absolute page URL taken from a `next` link
    pub async fn fetch_page(&self, url: &str) -> Result<Bundle> {
        let resp = self.request(Method::GET, url).send().await?;
        let value = handle_response(resp).await?;
        Ok(Bundle::from_value(value)?)
    }

    /// GET /{path}?{query}, passed through unchanged
    pub async fn get_path(&self, path: &str, query: Option<&str>) -> Result<Value> {
        let mut url = self.client.url(path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        tracing::debug!(url = %url, "FHIR GET");
        let resp = self.request(Method::GET, &url).send().await?;
        handle_response(resp).await
    }

    /// POST /{path} with a JSON body
    pub async fn post_path(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.client.url(path);
        tracing::debug!(url = %url, "FHIR POST");
        let resp = self
            .request(Method::POST, &url)
            .header(header::CONTENT_TYPE, FHIR_JSON)
            .json(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    /// POST a pre-serialized document to the service root
    pub async fn create_raw(&self, body: String, format: ContentFormat) -> Result<Value> {
        let url = self.client.url("");
        let resp = self
            .request(Method::POST, &url)
            .header(header::CONTENT_TYPE, format.mime())
            .body(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    /// Create a resource. Transaction bundles go through
    /// [`FhirSession::submit_transaction`]; everything else is a single
    /// POST to its resource type endpoint.
    pub async fn create(&self, resource: &Value) -> Result<Value> {
        let resource_type = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(ClientError::MissingResourceType)?;

        if resource_type == "Bundle" {
            let bundle = Bundle::from_value(resource.clone())?;
            if bundle.is_transaction() {
                let merged = self.submit_transaction(&bundle).await?;
                return Ok(merged.to_value()?);
            }
        }

        self.post_path(resource_type, resource).await
    }
}

/// Map a response to its JSON body or a [`ClientError::Status`]
pub(crate) async fn handle_response(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp.text().await?;

    if !status.is_success() {
        let diagnostics = OperationOutcome::summarize(&body).unwrap_or_default();
        tracing::error!(
            url = %url,
            status = %status,
            diagnostics = %diagnostics,
            "FHIR service error"
        );
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }

    if body.is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(&body)?)
}
