//! The token authority: sole issuer and validator of session tokens.
//!
//! Tokens are HS256 JWTs. Besides signature and expiry, every validation
//! re-reads the account's password-change marker from the
//! [`CredentialStore`], so changing a password revokes every outstanding
//! token for that account without a blacklist.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{Claims, Role};
use crate::clock::unix_secs;
use crate::error::{CoreError, CoreResult};
use crate::password;
use crate::store::{Account, CredentialStore, NewAccount};

/// A freshly signed token and its expiry (Unix seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    store: Arc<dyn CredentialStore>,
}

impl TokenAuthority {
    /// The secret is resolved once at startup and never re-read.
    pub fn new(secret: &[u8], store: Arc<dyn CredentialStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock in `validate_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub async fn issue(&self, user_id: i64, email: &str, role: Role) -> CoreResult<IssuedToken> {
        self.issue_at(user_id, email, role, unix_secs()).await
    }

    /// Signs claims as if the current time were `now` (Unix seconds).
    pub async fn issue_at(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        now: u64,
    ) -> CoreResult<IssuedToken> {
        let last_password_change = self
            .store
            .last_password_change(user_id)
            .await
            .map_err(into_persistence)?;

        let expires_at = now + role.token_ttl().as_secs();
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role,
            last_password_change,
            iat: now,
            exp: expires_at,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CoreError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub async fn validate(&self, token: &str) -> CoreResult<Claims> {
        self.validate_at(token, unix_secs()).await
    }

    /// Validates as if the current time were `now` (Unix seconds).
    pub async fn validate_at(&self, token: &str, now: u64) -> CoreResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => CoreError::InvalidSignature,
                ErrorKind::ExpiredSignature => CoreError::Expired,
                _ => CoreError::Malformed,
            })?
            .claims;

        if now >= claims.exp {
            return Err(CoreError::Expired);
        }

        let current = self
            .store
            .last_password_change(claims.user_id)
            .await
            .map_err(into_persistence)?;
        if claims.last_password_change < current {
            tracing::warn!(user_id = claims.user_id, "rejected token issued before password change");
            return Err(CoreError::Revoked);
        }

        Ok(claims)
    }

    /// Signs a brand-new token for the identity in `claims`.
    ///
    /// Callers must have obtained `claims` from [`validate`](Self::validate)
    /// so a revoked session cannot refresh itself.
    pub async fn refresh(&self, claims: &Claims) -> CoreResult<IssuedToken> {
        self.issue(claims.user_id, &claims.email, claims.role).await
    }

    /// Checks an email/password pair for an account of `role`.
    ///
    /// Unknown email, wrong password, inactive account and role mismatch all
    /// yield [`CoreError::InvalidCredentials`].
    pub async fn authenticate(&self, email: &str, password: &str, role: Role) -> CoreResult<Account> {
        let account = self.store.find_by_email(email).await.map_err(into_persistence)?;
        let password = password.to_owned();

        let Some(account) = account else {
            tokio::task::spawn_blocking(move || password::verify_against_dummy(&password))
                .await
                .map_err(|e| CoreError::Hashing(e.to_string()))?;
            return Err(CoreError::InvalidCredentials);
        };

        let hash = account.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || password::verify_password(&hash, &password))
            .await
            .map_err(|e| CoreError::Hashing(e.to_string()))??;

        if !valid || !account.active || account.role != role {
            return Err(CoreError::InvalidCredentials);
        }
        Ok(account)
    }

    /// Creates an account after checking email uniqueness and password strength.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> CoreResult<Account> {
        if self.store.find_by_email(email).await?.is_some() {
            return Err(CoreError::DuplicateEmail(email.to_string()));
        }
        password::ensure_strong_password(password)?;

        let password_hash = hash_blocking(password).await?;
        self.store
            .create(NewAccount {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
                role,
            })
            .await
    }

    /// Replaces the password, revoking every token issued before now.
    /// Returns the new password-change marker.
    pub async fn change_password(&self, user_id: i64, new_password: &str) -> CoreResult<i64> {
        password::ensure_strong_password(new_password)?;
        let password_hash = hash_blocking(new_password).await?;
        let marker = self.store.update_password(user_id, password_hash).await?;
        tracing::info!(user_id, "password changed; earlier tokens revoked");
        Ok(marker)
    }
}

async fn hash_blocking(password: &str) -> CoreResult<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| CoreError::Hashing(e.to_string()))?
}

fn into_persistence(e: CoreError) -> CoreError {
    match e {
        CoreError::Persistence(_) => e,
        other => CoreError::Persistence(other.to_string()),
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority").finish_non_exhaustive()
    }
}
