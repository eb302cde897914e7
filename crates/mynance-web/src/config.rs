use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use mynance_core::{load_toml, AuthorityClientConfig, RateLimitConfig, Role};
use serde::Deserialize;

const WEAK_SECRETS: &[&str] = &[
    "change-me-to-a-random-secret",
    "secret",
    "password",
    "jwt-secret",
    "mynance",
];

/// An account created in the credential store at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub email: String,
    /// Argon2 PHC string, as printed by `hash_password`.
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_user_cookie_ttl_hours")]
    pub user_cookie_ttl_hours: u64,
    #[serde(default = "default_admin_cookie_ttl_hours")]
    pub admin_cookie_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            user_cookie_ttl_hours: default_user_cookie_ttl_hours(),
            admin_cookie_ttl_hours: default_admin_cookie_ttl_hours(),
        }
    }
}

fn default_user_cookie_ttl_hours() -> u64 { 24 }
fn default_admin_cookie_ttl_hours() -> u64 { 12 }

/// Settings of the token authority process (`mynance-auth`).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityConfig {
    #[serde(default = "default_authority_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_authority_bind_addr(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            accounts: Vec::new(),
        }
    }
}

fn default_authority_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl AuthorityConfig {
    /// Reads `MYNANCE_AUTH_CONFIG` (if set), then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("MYNANCE_AUTH_CONFIG").map(PathBuf::from).ok();
        let mut config = Self::from_file(path.as_deref())?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.finalize()?;
        Ok(config)
    }

    pub fn from_file(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Ok(load_toml(path)?),
            None => Ok(Self::default()),
        }
    }

    pub fn apply_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(secret) = env("MYNANCE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(addr) = env("MYNANCE_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }
        Ok(())
    }

    /// Fills in a random secret when none is configured and rejects
    /// known placeholder secrets.
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        if self.auth.jwt_secret.is_empty() {
            self.auth.jwt_secret = format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
            tracing::warn!(
                "No JWT secret configured. Generated random secret (tokens will not survive a restart)."
            );
            return Ok(());
        }

        if WEAK_SECRETS.iter().any(|&w| self.auth.jwt_secret == w) {
            anyhow::bail!(
                "JWT secret matches a known weak/placeholder value. \
                 Set a strong random secret via MYNANCE_JWT_SECRET environment variable."
            );
        }
        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!(
                "JWT secret is shorter than 32 characters. \
                 Consider using a stronger secret via MYNANCE_JWT_SECRET."
            );
        }
        Ok(())
    }
}

/// Settings of a downstream resource service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub authority: AuthorityClientConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_service_bind_addr(),
            authority: AuthorityClientConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn default_service_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8081))
}

impl ServiceConfig {
    /// Reads `MYNANCE_SERVICE_CONFIG` (if set), then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("MYNANCE_SERVICE_CONFIG").map(PathBuf::from).ok();
        let mut config = Self::from_file(path.as_deref())?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.finalize()?;
        Ok(config)
    }

    pub fn from_file(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Ok(load_toml(path)?),
            None => Ok(Self::default()),
        }
    }

    pub fn apply_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(addr) = env("MYNANCE_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }
        if let Some(url) = env("MYNANCE_AUTH_URL") {
            self.authority.base_url = url;
        }
        if let Some(email) = env("MYNANCE_SERVICE_EMAIL") {
            self.authority.service_email = email;
        }
        if let Some(password) = env("MYNANCE_SERVICE_PASSWORD") {
            self.authority.service_password = password;
        }
        Ok(())
    }

    /// A service cannot authenticate anyone without its own credential.
    pub fn finalize(&self) -> anyhow::Result<()> {
        if self.authority.service_email.is_empty() || self.authority.service_password.is_empty() {
            anyhow::bail!(
                "Service credentials are not configured. \
                 Set MYNANCE_SERVICE_EMAIL and MYNANCE_SERVICE_PASSWORD."
            );
        }
        if self.authority.timeout_ms == 0 {
            anyhow::bail!("authority.timeout_ms must be greater than zero");
        }
        Ok(())
    }
}
