use std::num::NonZeroUsize;
use std::time::Duration;

use tigercare_core::{PageLimits, DEFAULT_MAX_ENTRIES_PER_BUNDLE};

/// Settings for one FHIR service connection
#[derive(Debug, Clone)]
pub struct FhirClientConfig {
    /// Service root, e.g. `https://workspace-fhir.fhir.azurehealthcareapis.com`
    pub base_url: String,
    /// Largest transaction bundle the service accepts in one request
    pub max_entries_per_bundle: NonZeroUsize,
    pub page_limits: PageLimits,
    /// Per-request timeout passed to the HTTP stack
    pub timeout: Option<Duration>,
}

impl FhirClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_entries_per_bundle: DEFAULT_MAX_ENTRIES_PER_BUNDLE,
            page_limits: PageLimits::unbounded(),
            timeout: None,
        }
    }

    pub fn with_max_entries_per_bundle(mut self, max: NonZeroUsize) -> Self {
        self.max_entries_per_bundle = max;
        self
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.page_limits = limits;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
