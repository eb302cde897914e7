//! Configuration shared by the authority and the downstream services.
//!
//! Process-specific settings (bind address, secrets, seeded accounts) live in
//! each binary; the sections here are embedded in those files.

pub mod settings;

pub use settings::{load_toml, AuthorityClientConfig, RateLimitConfig};
