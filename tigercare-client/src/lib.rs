//! tigercare-client - FHIR service client
//!
//! Bearer-authenticated access to a FHIR REST endpoint, with chunked
//! transaction upload and full pagination fetch.

pub mod client;
pub mod config;
pub mod error;
mod transfer;

pub use client::{ContentFormat, FhirClient, FhirSession};
pub use config::FhirClientConfig;
pub use error::{ClientError, Result};
