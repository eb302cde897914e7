//! Configuration sections shared by every mynance process.
//!
//! Each process embeds these sections in its own TOML file; all fields have
//! defaults so an empty section (or none at all) is valid.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Loads any deserializable configuration from a TOML file at `path`.
///
/// # Errors
///
/// - [`CoreError::NotFound`] if the file does not exist.
/// - [`CoreError::ConfigParse`] if the TOML is malformed.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> CoreResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CoreError::NotFound(path.to_path_buf()),
        _ => CoreError::Io(e),
    })?;
    toml::from_str(&content).map_err(|e| CoreError::ConfigParse(e.to_string()))
}

/// Per-client token bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_burst")]
    pub burst: u32,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// How often fully refilled buckets are dropped.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Stricter budget applied to credential endpoints on top of the global one.
    #[serde(default = "default_login_rpm")]
    pub login_requests_per_minute: u32,
    /// Budget of the service validation route, keyed by service address.
    #[serde(default = "default_service_burst")]
    pub service_burst: u32,
    #[serde(default = "default_service_rpm")]
    pub service_requests_per_minute: u32,
    /// Key clients by `X-Forwarded-For`/`X-Real-IP`/`Forwarded`. Only safe
    /// behind a proxy that overwrites those headers; otherwise the peer
    /// address is used.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: default_burst(),
            requests_per_minute: default_requests_per_minute(),
            sweep_interval_secs: default_sweep_interval_secs(),
            login_requests_per_minute: default_login_rpm(),
            service_burst: default_service_burst(),
            service_requests_per_minute: default_service_rpm(),
            trust_forwarded_headers: false,
        }
    }
}

impl RateLimitConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Settings for the credential-endpoint limiter: burst and refill both
    /// equal `login_requests_per_minute`.
    pub fn login(&self) -> RateLimitConfig {
        RateLimitConfig {
            burst: self.login_requests_per_minute,
            requests_per_minute: self.login_requests_per_minute,
            ..self.clone()
        }
    }

    /// Settings for the service validation limiter.
    pub fn service(&self) -> RateLimitConfig {
        RateLimitConfig {
            burst: self.service_burst,
            requests_per_minute: self.service_requests_per_minute,
            ..self.clone()
        }
    }
}

/// How a downstream service reaches the token authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub service_email: String,
    #[serde(default)]
    pub service_password: String,
    /// Bound on every call to the authority (login and validation).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Refresh the service token once less than this much lifetime remains.
    #[serde(default = "default_refresh_before_secs")]
    pub refresh_before_secs: u64,
}

impl Default for AuthorityClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            service_email: String::new(),
            service_password: String::new(),
            timeout_ms: default_timeout_ms(),
            refresh_before_secs: default_refresh_before_secs(),
        }
    }
}

impl AuthorityClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_before(&self) -> Duration {
        Duration::from_secs(self.refresh_before_secs)
    }
}

fn default_burst() -> u32 {
    100
}

fn default_requests_per_minute() -> u32 {
    200
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_login_rpm() -> u32 {
    20
}

fn default_service_burst() -> u32 {
    1000
}

fn default_service_rpm() -> u32 {
    6000
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_refresh_before_secs() -> u64 {
    120
}
