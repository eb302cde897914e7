use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use mynance_core::Role;

/// Session cookie of regular users, also read by downstream services.
pub const USER_COOKIE: &str = "token";
/// Session cookie of administrators.
pub const ADMIN_COOKIE: &str = "token-admin";

pub fn cookie_name(role: Role) -> &'static str {
    match role {
        Role::Admin => ADMIN_COOKIE,
        Role::User | Role::Service => USER_COOKIE,
    }
}

/// HttpOnly, Secure, SameSite=Strict session cookie scoped to `/`.
pub fn session_cookie(name: &'static str, token: String, ttl_hours: u64) -> Cookie<'static> {
    let ttl_hours = i64::try_from(ttl_hours).unwrap_or(i64::MAX / 3600);
    Cookie::build((name, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::hours(ttl_hours))
        .build()
}

/// Expires the named cookie on the client.
pub fn clear(jar: CookieJar, name: &'static str) -> CookieJar {
    jar.remove(Cookie::build((name, "")).path("/"))
}

/// Non-empty value of the named cookie.
pub fn read(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
