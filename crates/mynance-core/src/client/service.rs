//! The service's own credential against the token authority.
//!
//! A service logs in once with its configured email and password and keeps
//! the returned token in memory. Callers always get a usable token:
//!
//! - no token yet, or the cached one has expired: log in now, holding the
//!   cache lock so concurrent first requests share a single login;
//! - token close to expiry: hand out the current token and refresh it in a
//!   background task, at most one at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{join_url, LoginRequest, ServiceLoginResponse, SERVICE_LOGIN_PATH};
use crate::clock::unix_secs;
use crate::config::AuthorityClientConfig;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: u64,
}

pub struct ServiceAuthClient {
    http: reqwest::Client,
    login_url: String,
    email: String,
    password: String,
    refresh_before_secs: u64,
    cached: Mutex<Option<CachedToken>>,
    refreshing: AtomicBool,
}

impl std::fmt::Debug for ServiceAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAuthClient")
            .field("login_url", &self.login_url)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag even if the refresh task is cancelled.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ServiceAuthClient {
    /// Builds a client sharing `http` (and its timeout) with other callers.
    pub fn new(http: reqwest::Client, config: &AuthorityClientConfig) -> Self {
        Self {
            http,
            login_url: join_url(&config.base_url, SERVICE_LOGIN_PATH),
            email: config.service_email.clone(),
            password: config.service_password.clone(),
            refresh_before_secs: config.refresh_before_secs,
            cached: Mutex::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Returns a currently valid service token, logging in if needed.
    ///
    /// # Errors
    ///
    /// Fails only when no valid token is cached and the login fails.
    pub async fn token(self: &Arc<Self>) -> CoreResult<String> {
        let mut cached = self.cached.lock().await;
        let now = unix_secs();

        let current = match cached.as_ref() {
            Some(token) if token.expires_at > now => token.clone(),
            _ => {
                let fresh = self.fetch().await?;
                tracing::info!(expires_at = fresh.expires_at, "obtained service token");
                *cached = Some(fresh.clone());
                fresh
            }
        };
        drop(cached);

        if current.expires_at.saturating_sub(now) < self.refresh_before_secs {
            self.spawn_refresh();
        }
        Ok(current.token)
    }

    /// Logs in now and replaces the cached token.
    pub async fn login(&self) -> CoreResult<()> {
        let fresh = self.fetch().await?;
        *self.cached.lock().await = Some(fresh);
        Ok(())
    }

    /// Forgets the cached token so the next [`token`](Self::token) logs in.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Expiry of the cached token, if any.
    pub async fn cached_expiry(&self) -> Option<u64> {
        self.cached.lock().await.as_ref().map(|t| t.expires_at)
    }

    fn spawn_refresh(self: &Arc<Self>) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let client = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = RefreshGuard(&client.refreshing);
            match client.login().await {
                Ok(()) => tracing::debug!("refreshed service token"),
                Err(e) => tracing::warn!("service token refresh failed, keeping current token: {e}"),
            }
        });
    }

    async fn fetch(&self) -> CoreResult<CachedToken> {
        let response = self
            .http
            .post(&self.login_url)
            .json(&LoginRequest {
                email: self.email.clone(),
                password: self.password.clone(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "service login rejected");
            return Err(CoreError::UpstreamRejected {
                status: status.as_u16(),
            });
        }

        let body: ServiceLoginResponse = response.json().await?;
        if body.token.is_empty() {
            return Err(CoreError::Upstream("empty service token".to_string()));
        }
        Ok(CachedToken {
            token: body.token,
            expires_at: body.expires_at,
        })
    }
}
