//! In-process authentication for the authority's own protected routes.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use mynance_core::{Identity, Role};

use super::cookies::{self, ADMIN_COOKIE, USER_COOKIE};
use crate::error::AppError;
use crate::state::AuthorityState;

/// The caller's identity, as established by one of the auth middlewares.
pub struct AuthUser(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))
    }
}

/// `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn validate_cookie(
    state: &AuthorityState,
    jar: &CookieJar,
    name: &'static str,
    role: Role,
) -> Result<Identity, AppError> {
    let token = cookies::read(jar, name)
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    let claims = state.authority.validate(&token).await.map_err(|e| {
        tracing::warn!("rejected {name} cookie: {e}");
        AppError::from(e)
    })?;
    if claims.role != role {
        tracing::warn!(user_id = claims.user_id, role = %claims.role, "cookie role does not match route");
        return Err(AppError::Unauthorized("Invalid or expired token".to_string()));
    }
    Ok(claims.identity())
}

/// Routes for end users: cookie `token` with role `user`.
pub async fn require_user(
    State(state): State<AuthorityState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = validate_cookie(&state, &jar, USER_COOKIE, Role::User).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Routes for administrators: cookie `token-admin` with role `admin`.
pub async fn require_admin(
    State(state): State<AuthorityState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = validate_cookie(&state, &jar, ADMIN_COOKIE, Role::Admin).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Routes for service accounts: bearer token with role `service`.
///
/// A missing or invalid token is answered with a `WWW-Authenticate`
/// challenge; a valid token of another role is forbidden.
pub async fn require_service(
    State(state): State<AuthorityState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::InvalidBearer("Missing bearer token".to_string()))?
        .to_owned();

    let claims = state.authority.validate(&token).await.map_err(|e| {
        if e.is_unauthenticated() {
            tracing::warn!("rejected service bearer token: {e}");
            AppError::InvalidBearer("Invalid or expired token".to_string())
        } else {
            AppError::from(e)
        }
    })?;
    if claims.role != Role::Service {
        tracing::warn!(user_id = claims.user_id, role = %claims.role, "non-service token on service route");
        return Err(AppError::Forbidden("Not a service account".to_string()));
    }

    req.extensions_mut().insert(claims.identity());
    Ok(next.run(req).await)
}
