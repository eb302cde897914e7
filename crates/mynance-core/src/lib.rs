//! mynance core library: shared authentication for the mynance services.
//!
//! `mynance-core` holds everything that is independent of the HTTP
//! framework, so the token authority and every downstream service share
//! the same token, credential and rate-limit logic.
//!
//! # Modules
//!
//! - [`authority`]: Issues, validates and revokes signed tokens ([`TokenAuthority`]).
//! - [`claims`]: [`Role`], [`Claims`] and the request-scoped [`Identity`].
//! - [`store`]: The [`CredentialStore`] seam and an in-memory implementation.
//! - [`password`]: Argon2 hashing and the password complexity rules.
//! - [`client`]: Service-to-authority calls: [`ServiceAuthClient`], [`RemoteValidator`].
//! - [`rate_limit`]: Per-IP token buckets ([`RateLimiter`]).
//! - [`config`]: Configuration sections shared by every process.
//! - [`error`]: Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod authority;
pub mod claims;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod password;
pub mod rate_limit;
pub mod store;

pub use authority::{IssuedToken, TokenAuthority};
pub use claims::{Claims, Identity, Role};
pub use client::{RemoteValidator, ServiceAuthClient};
pub use config::{load_toml, AuthorityClientConfig, RateLimitConfig};
pub use error::{CoreError, CoreResult};
pub use rate_limit::{Decision, RateLimiter};
pub use store::{Account, CredentialStore, MemoryCredentialStore, NewAccount};
