//! Identity payloads: roles, signed claims and the request-scoped identity.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;

/// Account role embedded in every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Service,
}

impl Role {
    /// Lifetime of a token issued for this role.
    ///
    /// Service accounts get long-lived tokens because they re-login
    /// unattended; humans get a day.
    pub fn token_ttl(self) -> Duration {
        match self {
            Role::User | Role::Admin => Duration::from_secs(DAY),
            Role::Service => Duration::from_secs(90 * DAY),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Service => "service",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "service" => Ok(Role::Service),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Claims carried inside a session token.
///
/// Claims are never mutated after issuance; a refresh signs a brand-new set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    /// The account's password-change marker (Unix millis) at issuance.
    pub last_password_change: i64,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            email: self.email.clone(),
            role: self.role,
            expires_at: self.exp,
        }
    }
}

/// Who is calling, as established by an auth middleware.
///
/// Inserted into request extensions for downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub expires_at: u64,
}
