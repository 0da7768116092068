//! Per-CA configuration.
//!
//! Everything that differs between certificate authorities (endpoint, terms
//! of service) is a value here instead of being baked into the client.

use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

const LE_PRODUCTION_URL: &str = "https://acme-v01.api.letsencrypt.org";
const LE_STAGING_URL: &str = "https://acme-staging.api.letsencrypt.org";
const LE_LICENSE_URL: &str = "https://letsencrypt.org/documents/LE-SA-v1.2-November-15-2017.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaEnvironment {
    Staging,
    Production,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaConfig {
    /// Base URL that relative resource paths (`/acme/new-authz`, ...) resolve against.
    pub base_url: String,
    /// Subscriber agreement sent with account registration.
    pub license_url: String,
    /// Upper bound for each polling loop, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Per-request timeout of the HTTP client, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl CaConfig {
    pub fn new(base_url: impl Into<String>, license_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            license_url: license_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    pub fn lets_encrypt(environment: CaEnvironment) -> Self {
        match environment {
            CaEnvironment::Production => Self::new(LE_PRODUCTION_URL, LE_LICENSE_URL),
            CaEnvironment::Staging => Self::new(LE_STAGING_URL, LE_LICENSE_URL),
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Builds a configuration from `ACME_V1_*` environment variables, falling
    /// back to the Let's Encrypt staging preset for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::lets_encrypt(CaEnvironment::Staging);
        if let Some(base_url) = env_string("ACME_V1_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(license_url) = env_string("ACME_V1_LICENSE_URL") {
            config.license_url = license_url;
        }
        config.timeout_secs = env_secs("ACME_V1_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        config.http_timeout_secs = env_secs("ACME_V1_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS);
        config
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Resolves a resource path against the base URL; absolute URLs pass through.
    pub fn resolve(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("https://") || path_or_url.starts_with("http://") {
            return path_or_url.to_string();
        }
        if path_or_url.starts_with('/') {
            format!("{}{}", self.base_url, path_or_url)
        } else {
            format!("{}/{}", self.base_url, path_or_url)
        }
    }
}

impl Default for CaConfig {
    fn default() -> Self {
        Self::lets_encrypt(CaEnvironment::Staging)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn env_secs(key: &str, default: u64) -> u64 {
    let Some(raw) = env_string(key) else {
        return default;
    };
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => {
            warn!("[acme-config] invalid {key} value {raw:?}; using {default}s");
            default
        }
        Ok(secs) => secs,
    }
}
