//! Shared fixtures for the HTTP tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use http_body_util::BodyExt;
use mynance_core::store::{CredentialStore, MemoryCredentialStore};
use mynance_core::{password, Role};
use mynance_web::config::{AccountConfig, AuthorityConfig};
use mynance_web::state::{seed_accounts, AuthorityState};
use serde_json::Value;

pub const SECRET: &str = "test-secret-0123456789abcdef0123456789abcdef";

pub const ADMIN_EMAIL: &str = "admin@mynance.dev";
pub const ADMIN_PASSWORD: &str = "Adm1n!pass";
pub const SERVICE_EMAIL: &str = "expenses@mynance.dev";
pub const SERVICE_PASSWORD: &str = "S3rvice!pw";

pub fn authority_config() -> AuthorityConfig {
    let mut config = AuthorityConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.accounts = vec![
        AccountConfig {
            name: "Admin".to_string(),
            email: ADMIN_EMAIL.to_string(),
            password_hash: password::hash_password(ADMIN_PASSWORD).unwrap(),
            role: Role::Admin,
        },
        AccountConfig {
            name: "Expenses service".to_string(),
            email: SERVICE_EMAIL.to_string(),
            password_hash: password::hash_password(SERVICE_PASSWORD).unwrap(),
            role: Role::Service,
        },
    ];
    config
}

pub async fn authority_state(config: AuthorityConfig) -> AuthorityState {
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    seed_accounts(store.as_ref(), &config.accounts).await.unwrap();
    AuthorityState::with_store(config, store)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn json_request_with_cookie(method: &str, uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// `name=value` of the first `Set-Cookie` for `name`, ready for a `Cookie` header.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Full `Set-Cookie` line for `name`, attributes included.
pub fn set_cookie_line(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}
