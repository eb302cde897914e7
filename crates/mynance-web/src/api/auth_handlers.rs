use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use mynance_core::client::USER_TOKEN_HEADER;
use mynance_core::{CoreError, IssuedToken, Role};

use crate::auth::cookies::{self, ADMIN_COOKIE, USER_COOKIE};
use crate::auth::AuthUser;
use crate::dto::*;
use crate::error::AppError;
use crate::state::AuthorityState;

fn cookie_ttl_hours(state: &AuthorityState, role: Role) -> u64 {
    match role {
        Role::Admin => state.config.auth.admin_cookie_ttl_hours,
        Role::User | Role::Service => state.config.auth.user_cookie_ttl_hours,
    }
}

/// A still-valid session cookie of the right role gets a fresh token
/// without re-entering credentials. Revoked or foreign cookies fall
/// through to the password flow.
async fn refresh_from_cookie(
    state: &AuthorityState,
    jar: &CookieJar,
    role: Role,
) -> Option<IssuedToken> {
    let token = cookies::read(jar, cookies::cookie_name(role))?;
    let claims = match state.authority.validate(&token).await {
        Ok(claims) if claims.role == role => claims,
        Ok(_) => return None,
        Err(e) => {
            tracing::debug!("ignoring existing {role} cookie: {e}");
            return None;
        }
    };
    match state.authority.refresh(&claims).await {
        Ok(issued) => Some(issued),
        Err(e) => {
            tracing::warn!(user_id = claims.user_id, "token refresh failed: {e}");
            None
        }
    }
}

async fn cookie_login(
    state: AuthorityState,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
    role: Role,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let name = cookies::cookie_name(role);
    let ttl_hours = cookie_ttl_hours(&state, role);

    if let Some(issued) = refresh_from_cookie(&state, &jar, role).await {
        let jar = jar.add(cookies::session_cookie(name, issued.token, ttl_hours));
        return Ok((jar, Json(MessageResponse::new("Token refreshed successfully"))));
    }

    let Json(body) = body?;

    let account = state
        .authority
        .authenticate(&body.email, &body.password, role)
        .await
        .inspect_err(|e| {
            if matches!(e, CoreError::InvalidCredentials) {
                tracing::warn!("Failed {role} login attempt for {}", body.email);
            }
        })?;
    let issued = state
        .authority
        .issue(account.id, &account.email, account.role)
        .await?;

    tracing::info!(user_id = account.id, %role, "login successful");
    let jar = jar.add(cookies::session_cookie(name, issued.token, ttl_hours));
    Ok((jar, Json(MessageResponse::new("Login successful"))))
}

pub async fn login(
    State(state): State<AuthorityState>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    cookie_login(state, jar, body, Role::User).await
}

pub async fn admin_login(
    State(state): State<AuthorityState>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    cookie_login(state, jar, body, Role::Admin).await
}

pub async fn service_login(
    State(state): State<AuthorityState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ServiceLoginResponse>, AppError> {
    let Json(body) = body?;
    let account = state
        .authority
        .authenticate(&body.email, &body.password, Role::Service)
        .await
        .inspect_err(|e| {
            if matches!(e, CoreError::InvalidCredentials) {
                tracing::warn!("Failed service login attempt for {}", body.email);
            }
        })?;
    let issued = state
        .authority
        .issue(account.id, &account.email, Role::Service)
        .await?;

    tracing::info!(user_id = account.id, "service token issued");
    Ok(Json(ServiceLoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        cookies::clear(jar, USER_COOKIE),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

pub async fn admin_logout(
    AuthUser(identity): AuthUser,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    tracing::info!(user_id = identity.user_id, "admin logged out");
    (
        cookies::clear(jar, ADMIN_COOKIE),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

async fn register_account(
    state: &AuthorityState,
    body: RegisterRequest,
    role: Role,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if body.name.trim().is_empty() || body.email.trim().is_empty() {
        return Err(AppError::BadRequest("Name and email are required".to_string()));
    }

    let account = state
        .authority
        .register(body.name.trim(), body.email.trim(), &body.password, role)
        .await?;

    tracing::info!(id = account.id, %role, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: account.id,
            email: account.email,
            message: format!("{role} account registered successfully"),
        }),
    ))
}

pub async fn register(
    State(state): State<AuthorityState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(body) = body?;
    register_account(&state, body, Role::User).await
}

/// Admin-only: creates a service account.
pub async fn register_service(
    State(state): State<AuthorityState>,
    AuthUser(admin): AuthUser,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(body) = body?;
    tracing::info!(admin_id = admin.user_id, email = %body.email, "registering service account");
    register_account(&state, body, Role::Service).await
}

/// Changes the caller's password. Every token issued before the change,
/// including the one on this request, stops validating; the response
/// carries a fresh cookie.
pub async fn change_password(
    State(state): State<AuthorityState>,
    AuthUser(identity): AuthUser,
    jar: CookieJar,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let Json(body) = body?;
    state
        .authority
        .change_password(identity.user_id, &body.password)
        .await?;
    let issued = state
        .authority
        .issue(identity.user_id, &identity.email, identity.role)
        .await?;

    let ttl_hours = cookie_ttl_hours(&state, identity.role);
    let jar = jar.add(cookies::session_cookie(
        cookies::cookie_name(identity.role),
        issued.token,
        ttl_hours,
    ));
    Ok((jar, Json(MessageResponse::new("Password updated successfully"))))
}

/// Called by downstream services (behind `require_service`) to check a
/// user's token passed in `X-User-Token`.
pub async fn validate_token(State(state): State<AuthorityState>, headers: HeaderMap) -> Response {
    let Some(user_token) = headers
        .get(USER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ValidateTokenResponse::invalid("Missing X-User-Token header")),
        )
            .into_response();
    };

    match state.authority.validate(user_token).await {
        Ok(claims) => Json(ValidateTokenResponse::valid(&claims.identity())).into_response(),
        Err(e) if e.is_unauthenticated() => {
            tracing::debug!("user token rejected: {e}");
            let reason = match e {
                CoreError::Expired => "Token expired",
                CoreError::Revoked => "Token revoked",
                _ => "Invalid token",
            };
            (StatusCode::UNAUTHORIZED, Json(ValidateTokenResponse::invalid(reason))).into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
