use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;
use tigercare_client::FhirClientConfig;
use tigercare_core::{PageLimits, DEFAULT_MAX_ENTRIES_PER_BUNDLE};

/// Server configuration loaded from YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub fhir: FhirSettings,
    pub session: SessionSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Upstream FHIR service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FhirSettings {
    /// Unset means the FHIR routes answer 500
    pub service_url: Option<String>,
    pub max_entries_per_bundle: usize,
    /// Pagination caps; unset leaves the walk unbounded
    pub max_pages: Option<usize>,
    pub max_elapsed_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// HS256 secret used to verify session cookies
    pub jwt_secret: Option<String>,
    /// Path prefixes that require a valid session
    pub protected_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for FhirSettings {
    fn default() -> Self {
        Self {
            service_url: None,
            max_entries_per_bundle: DEFAULT_MAX_ENTRIES_PER_BUNDLE.get(),
            max_pages: None,
            max_elapsed_secs: None,
            timeout_secs: None,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "session_token".to_string(),
            jwt_secret: None,
            protected_paths: vec![
                "/api/ai/chat".to_string(),
                "/patients".to_string(),
                "/upload".to_string(),
                "/api/users".to_string(),
            ],
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };

        if let Ok(port) = std::env::var("TIGERCARE_PORT")
            && let Ok(port_num) = port.parse()
        {
            config.server.port = port_num;
        }

        if let Ok(host) = std::env::var("TIGERCARE_HOST") {
            config.server.host = host;
        }

        if let Ok(url) = std::env::var("FHIR_SERVICE_URL")
            && !url.is_empty()
        {
            config.fhir.service_url = Some(url);
        }

        if let Ok(secret) = std::env::var("JWT_SECRET")
            && !secret.is_empty()
        {
            config.session.jwt_secret = Some(secret);
        }

        if let Ok(max_pages) = std::env::var("TIGERCARE_MAX_PAGES")
            && let Ok(n) = max_pages.parse()
        {
            config.fhir.max_pages = Some(n);
        }

        Ok(config)
    }

    /// Client settings for the upstream FHIR service, `None` if no
    /// service URL is configured
    pub fn fhir_client_config(&self) -> Result<Option<FhirClientConfig>, String> {
        let Some(url) = self.fhir.service_url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(None);
        };

        let max_entries = NonZeroUsize::new(self.fhir.max_entries_per_bundle)
            .ok_or_else(|| "fhir.max_entries_per_bundle must be greater than 0".to_string())?;

        let max_pages = match self.fhir.max_pages {
            Some(n) => Some(
                NonZeroUsize::new(n)
                    .ok_or_else(|| "fhir.max_pages must be greater than 0".to_string())?,
            ),
            None => None,
        };

        let limits = PageLimits {
            max_pages,
            max_elapsed: self.fhir.max_elapsed_secs.map(Duration::from_secs),
        };

        let mut client_config = FhirClientConfig::new(url)
            .with_max_entries_per_bundle(max_entries)
            .with_page_limits(limits);
        if let Some(secs) = self.fhir.timeout_secs {
            client_config = client_config.with_timeout(Duration::from_secs(secs));
        }

        Ok(Some(client_config))
    }

    /// True if the request path requires a session cookie
    pub fn is_protected(&self, path: &str) -> bool {
        self.session
            .protected_paths
            .iter()
            .any(|p| path.starts_with(p.as_str()))
    }
}
