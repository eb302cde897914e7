mod auth_handlers;
pub mod expenses;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{require_admin, require_service, require_user};
use crate::auth::remote::require_remote_user;
use crate::middleware::rate_limit::rate_limit;
use crate::middleware::security_headers::security_headers;
use crate::state::{AuthorityState, ServiceState};

const MAX_BODY_BYTES: usize = 64 * 1024;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Every route of the token authority.
///
/// Layering, outermost first: trace, security headers, rate limiter, route
/// auth. Service validation has its own limiter because every downstream
/// request funnels through it from a handful of service addresses; every
/// other route shares the per-IP limiter, and credential routes add a
/// stricter one.
pub fn authority_router(state: AuthorityState) -> Router {
    let credential_routes = Router::new()
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/admin/login", post(auth_handlers::admin_login))
        .route("/auth/service/login", post(auth_handlers::service_login))
        .route("/auth/register", post(auth_handlers::register))
        .layer(from_fn_with_state(state.login_limiter.clone(), rate_limit));

    let user_routes = Router::new()
        .route("/auth/password", put(auth_handlers::change_password))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    let admin_routes = Router::new()
        .route("/auth/admin/logout", post(auth_handlers::admin_logout))
        .route("/auth/admin/register", post(auth_handlers::register_service))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/logout", post(auth_handlers::logout));

    let limited = Router::new()
        .merge(credential_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .merge(public_routes)
        .layer(from_fn_with_state(state.limiter.clone(), rate_limit));

    let service_routes = Router::new()
        .route("/auth/service/validate-token", get(auth_handlers::validate_token))
        .route_layer(from_fn_with_state(state.clone(), require_service))
        .layer(from_fn_with_state(state.service_limiter.clone(), rate_limit));

    Router::new()
        .merge(limited)
        .merge(service_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Routes of the expenses service. Everything is rate limited; all but
/// `/health` sits behind remote authentication.
pub fn expenses_router(state: ServiceState) -> Router {
    let protected = Router::new()
        .route("/expenses", get(expenses::list).post(expenses::create))
        .route("/expenses/{id}", get(expenses::get_one))
        .route("/me", get(expenses::me))
        .route_layer(from_fn_with_state(state.validator.clone(), require_remote_user));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(from_fn_with_state(state.limiter.clone(), rate_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
