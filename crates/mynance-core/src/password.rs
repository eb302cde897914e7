use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{CoreError, CoreResult};

const SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

pub fn verify_password(hash: &str, password: &str) -> CoreResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| CoreError::Hashing(format!("invalid password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::Hashing(format!("failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

/// Checks that `hash` is a PHC string we can verify against.
pub fn validate_hash(hash: &str) -> CoreResult<()> {
    PasswordHash::new(hash)
        .map(|_| ())
        .map_err(|e| CoreError::Hashing(format!("invalid password hash: {e}")))
}

/// Burns the same CPU as a real verification and always fails.
///
/// Used when the account does not exist so response timing does not reveal
/// which emails are registered.
pub fn verify_against_dummy(password: &str) -> bool {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY.get_or_init(|| hash_password("mynance-dummy-password").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(hash, password);
    }
    false
}

/// At least 8 characters with an upper-case letter, a lower-case letter,
/// a digit and one of ``!@#$%^&*(),.?":{}|<>``.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| SYMBOLS.contains(c))
}

/// Returns [`CoreError::WeakPassword`] unless [`is_strong_password`] holds.
pub fn ensure_strong_password(password: &str) -> CoreResult<()> {
    if is_strong_password(password) {
        Ok(())
    } else {
        Err(CoreError::WeakPassword)
    }
}
