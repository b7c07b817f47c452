use thiserror::Error;
use tigercare_core::CoreError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid FHIR base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx reply. `body` is the upstream body, unmodified.
    #[error("FHIR API error: {status} {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid FHIR resource: missing resourceType")]
    MissingResourceType,

    #[error("Transaction chunk {chunk}/{total} failed: {source}")]
    ChunkFailed {
        chunk: usize,
        total: usize,
        #[source]
        source: Box<ClientError>,
    },

    #[error("Fetching page {page} failed: {source}")]
    PageFailed {
        page: usize,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Upstream HTTP status, looking through chunk/page wrappers
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::ChunkFailed { source, .. } | ClientError::PageFailed { source, .. } => {
                source.status()
            }
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Upstream response body, looking through chunk/page wrappers
    pub fn body(&self) -> Option<&str> {
        match self {
            ClientError::Status { body, .. } => Some(body),
            ClientError::ChunkFailed { source, .. } | ClientError::PageFailed { source, .. } => {
                source.body()
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
