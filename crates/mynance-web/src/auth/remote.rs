//! Authentication for downstream services: every request is checked by
//! the token authority.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use mynance_core::client::USER_TOKEN_HEADER;
use mynance_core::RemoteValidator;

use super::cookies::{self, USER_COOKIE};
use crate::error::AppError;

/// Cookie `token`, falling back to the `X-User-Token` header.
fn caller_token(jar: &CookieJar, req: &Request) -> Option<String> {
    cookies::read(jar, USER_COOKIE).or_else(|| {
        req.headers()
            .get(USER_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    })
}

/// Rejects the request unless the authority vouches for the caller's token.
/// Fails closed: an unreachable or misbehaving authority means 401.
pub async fn require_remote_user(
    State(validator): State<Arc<RemoteValidator>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = caller_token(&jar, &req)
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    let identity = validator.validate(&token).await.map_err(|e| {
        tracing::warn!("remote token validation failed: {e}");
        AppError::from(e)
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
