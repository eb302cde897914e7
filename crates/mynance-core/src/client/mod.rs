//! Client side of the token authority, used by downstream services.
//!
//! - [`ServiceAuthClient`] keeps the service's own token fresh.
//! - [`RemoteValidator`] asks the authority whether a user token is valid.
//!
//! The wire types below are shared with the authority's handlers so both
//! ends serialize the same shapes.

pub mod remote;
pub mod service;

use serde::{Deserialize, Serialize};

use crate::claims::{Identity, Role};
use crate::config::AuthorityClientConfig;
use crate::error::{CoreError, CoreResult};

pub use remote::RemoteValidator;
pub use service::ServiceAuthClient;

pub const SERVICE_LOGIN_PATH: &str = "/auth/service/login";
pub const VALIDATE_TOKEN_PATH: &str = "/auth/service/validate-token";

/// Header carrying the end user's token on a validation call.
pub const USER_TOKEN_HEADER: &str = "x-user-token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body returned by `POST /auth/service/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLoginResponse {
    pub token: String,
    /// Unix seconds.
    pub expires_at: u64,
}

/// Body returned by `GET /auth/service/validate-token`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidateTokenResponse {
    pub fn valid(identity: &Identity) -> Self {
        Self {
            valid: true,
            user_id: Some(identity.user_id),
            email: Some(identity.email.clone()),
            role: Some(identity.role),
            expires_at: Some(identity.expires_at),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// The identity, when the response is valid and complete.
    pub fn into_identity(self) -> Option<Identity> {
        if !self.valid {
            return None;
        }
        Some(Identity {
            user_id: self.user_id?,
            email: self.email?,
            role: self.role?,
            expires_at: self.expires_at?,
        })
    }
}

/// Builds the HTTP client shared by [`ServiceAuthClient`] and
/// [`RemoteValidator`]; every call it makes is bounded by the configured timeout.
pub fn http_client(config: &AuthorityClientConfig) -> CoreResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| CoreError::Upstream(format!("cannot build HTTP client: {e}")))
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
