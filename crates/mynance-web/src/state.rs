use std::sync::Arc;

use mynance_core::store::{CredentialStore, MemoryCredentialStore, NewAccount};
use mynance_core::{password, CoreError, RateLimiter, RemoteValidator, TokenAuthority};

use crate::config::{AccountConfig, AuthorityConfig};
use crate::expenses::ExpenseStore;

/// State of the token authority process.
#[derive(Clone)]
pub struct AuthorityState {
    pub config: Arc<AuthorityConfig>,
    pub authority: Arc<TokenAuthority>,
    /// Applies to every route except service validation.
    pub limiter: Arc<RateLimiter>,
    /// Applies to credential endpoints on top of `limiter`.
    pub login_limiter: Arc<RateLimiter>,
    /// Applies to service validation, whose traffic arrives from a few
    /// downstream addresses on behalf of all of their users.
    pub service_limiter: Arc<RateLimiter>,
}

impl AuthorityState {
    /// Builds the authority around an in-memory store seeded from `config.accounts`.
    pub async fn from_config(config: AuthorityConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
        seed_accounts(store.as_ref(), &config.accounts).await?;
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: AuthorityConfig, store: Arc<dyn CredentialStore>) -> Self {
        let authority = TokenAuthority::new(config.auth.jwt_secret.as_bytes(), store);
        Self {
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            login_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit.login())),
            service_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit.service())),
            authority: Arc::new(authority),
            config: Arc::new(config),
        }
    }
}

/// Inserts configured accounts, skipping emails that already exist.
pub async fn seed_accounts(
    store: &dyn CredentialStore,
    accounts: &[AccountConfig],
) -> anyhow::Result<()> {
    for account in accounts {
        password::validate_hash(&account.password_hash).map_err(|e| {
            anyhow::anyhow!("account {}: {e} (generate one with hash_password)", account.email)
        })?;

        let created = store
            .create(NewAccount {
                name: account.name.clone(),
                email: account.email.clone(),
                password_hash: account.password_hash.clone(),
                role: account.role,
            })
            .await;
        match created {
            Ok(created) => {
                tracing::info!(id = created.id, email = %created.email, role = %created.role, "seeded account");
            }
            Err(CoreError::DuplicateEmail(email)) => {
                tracing::warn!("skipping duplicate account {email}");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// State of a downstream resource service.
#[derive(Clone)]
pub struct ServiceState {
    pub validator: Arc<RemoteValidator>,
    pub limiter: Arc<RateLimiter>,
    pub expenses: Arc<ExpenseStore>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mynance_core::Role;

    fn account(email: &str, hash: &str) -> AccountConfig {
        AccountConfig {
            name: "Expenses".to_string(),
            email: email.to_string(),
            password_hash: hash.to_string(),
            role: Role::Service,
        }
    }

    #[tokio::test]
    async fn seeding_skips_duplicates() {
        let hash = password::hash_password("S3rvice!pw").unwrap();
        let store = MemoryCredentialStore::new();
        seed_accounts(
            &store,
            &[account("svc@mynance.dev", &hash), account("SVC@mynance.dev", &hash)],
        )
        .await
        .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn seeding_rejects_plaintext_password() {
        let store = MemoryCredentialStore::new();
        let err = seed_accounts(&store, &[account("svc@mynance.dev", "S3rvice!pw")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("svc@mynance.dev"));
        assert!(store.is_empty());
    }
}
