use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

pub const BUNDLE_TYPE_TRANSACTION: &str = "transaction";
pub const BUNDLE_TYPE_TRANSACTION_RESPONSE: &str = "transaction-response";
pub const BUNDLE_TYPE_SEARCHSET: &str = "searchset";

/// Link relation followed by the pagination walk
pub const LINK_RELATION_NEXT: &str = "next";

/// FHIR Bundle container
///
/// Only the fields the transfer adapter reads are typed. Everything else
/// (meta, timestamp, signature, ...) rides along in `rest` so a copied
/// bundle keeps every field of the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,

    /// All other fields are stored here
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Bundle.entry, carried opaquely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl", skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Bundle.link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

impl Bundle {
    /// Create an empty bundle of the given type
    pub fn new(bundle_type: impl Into<String>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            id: None,
            bundle_type: Some(bundle_type.into()),
            total: None,
            link: Vec::new(),
            entry: Vec::new(),
            rest: Map::new(),
        }
    }

    /// Decode a JSON value, rejecting anything that is not a Bundle
    pub fn from_value(value: Value) -> Result<Self> {
        match value.get("resourceType").and_then(Value::as_str) {
            Some("Bundle") => Ok(serde_json::from_value(value)?),
            other => Err(CoreError::NotABundle {
                found: other.unwrap_or("<missing>").to_string(),
            }),
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn is_transaction(&self) -> bool {
        self.bundle_type.as_deref() == Some(BUNDLE_TYPE_TRANSACTION)
    }

    /// URL of the `next` page link, if any
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == LINK_RELATION_NEXT)
            .map(|l| l.url.as_str())
    }

    /// Copy every field except `entry`, which is replaced
    pub fn with_entries(&self, entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            id: self.id.clone(),
            bundle_type: self.bundle_type.clone(),
            total: self.total,
            link: self.link.clone(),
            entry,
            rest: self.rest.clone(),
        }
    }
}

impl BundleEntry {
    /// Entry wrapping a single resource
    pub fn from_resource(resource: Value) -> Self {
        Self {
            full_url: None,
            resource: Some(resource),
            request: None,
            response: None,
            rest: Map::new(),
        }
    }
}
