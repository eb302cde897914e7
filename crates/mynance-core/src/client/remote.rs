//! Remote validation of end-user tokens.
//!
//! Downstream services do not hold the signing secret. They forward the
//! user's token to the authority, authenticating themselves with their
//! service token, and trust the identity it returns. Every failure along
//! the way, including an unreachable authority, is a rejection.

use std::sync::Arc;

use reqwest::header::WWW_AUTHENTICATE;
use reqwest::StatusCode;

use super::{
    join_url, ServiceAuthClient, ValidateTokenResponse, USER_TOKEN_HEADER, VALIDATE_TOKEN_PATH,
};
use crate::claims::Identity;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct RemoteValidator {
    http: reqwest::Client,
    validate_url: String,
    service: Arc<ServiceAuthClient>,
}

impl RemoteValidator {
    pub fn new(http: reqwest::Client, base_url: &str, service: Arc<ServiceAuthClient>) -> Self {
        Self {
            http,
            validate_url: join_url(base_url, VALIDATE_TOKEN_PATH),
            service,
        }
    }

    pub fn service(&self) -> &Arc<ServiceAuthClient> {
        &self.service
    }

    /// Asks the authority who owns `user_token`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Upstream`] if the authority cannot be reached or answers garbage.
    /// - [`CoreError::UpstreamRejected`] on any non-success status.
    /// - [`CoreError::TokenRejected`] if the authority says the token is invalid.
    pub async fn validate(&self, user_token: &str) -> CoreResult<Identity> {
        let service_token = self.service.token().await?;

        let response = self
            .http
            .get(&self.validate_url)
            .bearer_auth(service_token)
            .header(USER_TOKEN_HEADER, user_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED && response.headers().contains_key(WWW_AUTHENTICATE) {
            // Our own credential was refused, not the user's token.
            tracing::warn!("authority rejected the service token, dropping it");
            self.service.invalidate().await;
        }
        if !status.is_success() {
            return Err(CoreError::UpstreamRejected {
                status: status.as_u16(),
            });
        }

        let body: ValidateTokenResponse = response.json().await?;
        if !body.valid {
            let reason = body.error.unwrap_or_else(|| "invalid token".to_string());
            return Err(CoreError::TokenRejected(reason));
        }
        body.into_identity()
            .ok_or_else(|| CoreError::Upstream("incomplete identity in validation response".to_string()))
    }
}
