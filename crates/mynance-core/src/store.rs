//! Credential persistence.
//!
//! The token authority only needs a narrow view of account storage, captured
//! by [`CredentialStore`]. [`MemoryCredentialStore`] is the implementation
//! shipped with the binaries (seeded from configuration) and used in tests.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::claims::Role;
use crate::clock::{unix_millis, unix_secs};
use crate::error::{CoreError, CoreResult};

/// A stored account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub created_at: u64,
    /// Unix millis of the last password change (creation counts as one).
    pub last_password_change: i64,
}

/// Input for [`CredentialStore::create`]; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> CoreResult<Option<Account>>;

    async fn find_by_id(&self, id: i64) -> CoreResult<Option<Account>>;

    /// Current password-change marker for `id`, or `0` when there is no such
    /// account. A missing row is not an error.
    async fn last_password_change(&self, id: i64) -> CoreResult<i64>;

    /// Fails with [`CoreError::DuplicateEmail`] when the email is taken.
    async fn create(&self, account: NewAccount) -> CoreResult<Account>;

    /// Replaces the hash and advances the marker; returns the new marker.
    async fn update_password(&self, id: i64, password_hash: String) -> CoreResult<i64>;
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lock-sharded in-memory account table.
pub struct MemoryCredentialStore {
    accounts: DashMap<i64, Account>,
    emails: DashMap<String, i64>,
    next_id: AtomicI64,
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            emails: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn insert(&self, account: NewAccount) -> CoreResult<Account> {
        match self.emails.entry(email_key(&account.email)) {
            Entry::Occupied(_) => Err(CoreError::DuplicateEmail(account.email)),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let stored = Account {
                    id,
                    name: account.name,
                    email: account.email.trim().to_string(),
                    password_hash: account.password_hash,
                    role: account.role,
                    active: true,
                    created_at: unix_secs(),
                    last_password_change: unix_millis(),
                };
                self.accounts.insert(id, stored.clone());
                slot.insert(id);
                Ok(stored)
            }
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> CoreResult<Option<Account>> {
        let Some(id) = self.emails.get(&email_key(email)).map(|r| *r) else {
            return Ok(None);
        };
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn find_by_id(&self, id: i64) -> CoreResult<Option<Account>> {
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn last_password_change(&self, id: i64) -> CoreResult<i64> {
        Ok(self
            .accounts
            .get(&id)
            .map(|a| a.last_password_change)
            .unwrap_or(0))
    }

    async fn create(&self, account: NewAccount) -> CoreResult<Account> {
        let stored = self.insert(account)?;
        tracing::debug!(id = stored.id, role = %stored.role, "account created");
        Ok(stored)
    }

    async fn update_password(&self, id: i64, password_hash: String) -> CoreResult<i64> {
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| CoreError::Persistence(format!("account {id} not found")))?;
        // Strictly later than any marker already embedded in a token.
        let marker = unix_millis().max(account.last_password_change + 1);
        account.password_hash = password_hash;
        account.last_password_change = marker;
        Ok(marker)
    }
}
