//! Error types for `mynance-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

use std::path::PathBuf;

/// Unified error type for all core operations.
///
/// Token failures are split finely so the authority can log the precise
/// cause, while the HTTP layer collapses them into a single `401`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The token could not be parsed as a JWT carrying our claims.
    #[error("malformed token")]
    Malformed,

    /// The token signature does not match the signing secret.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token is past its expiry.
    #[error("token expired")]
    Expired,

    /// The token predates the account's last password change.
    #[error("token revoked by password change")]
    Revoked,

    /// Unknown account, wrong password, inactive account or wrong role.
    /// Deliberately a single variant so callers cannot tell them apart.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("email already in use: {0}")]
    DuplicateEmail(String),

    /// The password does not satisfy the complexity rules.
    #[error(
        "password must be at least 8 characters long, include an uppercase letter, \
         a lowercase letter, a number, and a special character"
    )]
    WeakPassword,

    /// The credential store failed to answer.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The token could not be signed.
    #[error("signing error: {0}")]
    Signing(String),

    /// A password could not be hashed or a stored hash could not be parsed.
    #[error("hashing error: {0}")]
    Hashing(String),

    /// The token authority could not be reached (DNS, connect, timeout, decode).
    #[error("token authority unavailable: {0}")]
    Upstream(String),

    /// The token authority answered with a non-success status.
    #[error("token authority rejected the request with status {status}")]
    UpstreamRejected { status: u16 },

    /// The token authority answered but declared the caller's token invalid.
    #[error("token rejected by authority: {0}")]
    TokenRejected(String),

    /// Failed to parse a TOML configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// A configuration file does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Returns `true` for failures that mean "this caller is not
    /// authenticated": bad tokens, bad credentials, and an unreachable or
    /// refusing authority (fail closed).
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            CoreError::Malformed
                | CoreError::InvalidSignature
                | CoreError::Expired
                | CoreError::Revoked
                | CoreError::InvalidCredentials
                | CoreError::Upstream(_)
                | CoreError::UpstreamRejected { .. }
                | CoreError::TokenRejected(_)
        )
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Upstream(e.to_string())
    }
}

/// Convenience alias used throughout `mynance-core`.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_displays_cause() {
        assert_eq!(
            CoreError::Revoked.to_string(),
            "token revoked by password change"
        );
    }

    #[test]
    fn duplicate_email_displays_address() {
        let err = CoreError::DuplicateEmail("a@b.c".to_string());
        assert_eq!(err.to_string(), "email already in use: a@b.c");
    }

    #[test]
    fn upstream_rejected_displays_status() {
        let err = CoreError::UpstreamRejected { status: 503 };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn token_failures_are_unauthenticated() {
        for err in [
            CoreError::Malformed,
            CoreError::InvalidSignature,
            CoreError::Expired,
            CoreError::Revoked,
            CoreError::InvalidCredentials,
            CoreError::Upstream("connection refused".into()),
            CoreError::UpstreamRejected { status: 500 },
            CoreError::TokenRejected("expired".into()),
        ] {
            assert!(err.is_unauthenticated(), "{err:?}");
        }
    }

    #[test]
    fn infrastructure_failures_are_not_unauthenticated() {
        assert!(!CoreError::Persistence("db down".into()).is_unauthenticated());
        assert!(!CoreError::Signing("bad key".into()).is_unauthenticated());
        assert!(!CoreError::DuplicateEmail("x".into()).is_unauthenticated());
        assert!(!CoreError::WeakPassword.is_unauthenticated());
    }

    #[test]
    fn io_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
        assert!(core_err.to_string().contains("gone"));
    }
}
