//! `mynance-expenses`: a resource service that delegates authentication
//! to the token authority.

use std::net::SocketAddr;
use std::sync::Arc;

use mynance_core::client::http_client;
use mynance_core::{RateLimiter, RemoteValidator, ServiceAuthClient};
use mynance_web::api;
use mynance_web::config::ServiceConfig;
use mynance_web::expenses::ExpenseStore;
use mynance_web::state::ServiceState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mynance_web::init_tracing();

    let config = ServiceConfig::load()?;
    let bind_addr = config.bind_addr;

    let http = http_client(&config.authority)?;
    let service_client = Arc::new(ServiceAuthClient::new(http.clone(), &config.authority));
    // Warm the cache so the first user request does not pay for the login.
    // The authority may not be up yet; `token()` retries on demand.
    if let Err(e) = service_client.login().await {
        tracing::warn!("initial service login failed, will retry on first request: {e}");
    }
    let validator = Arc::new(RemoteValidator::new(
        http,
        &config.authority.base_url,
        service_client,
    ));

    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
    let sweeper = limiter.spawn_sweeper(config.rate_limit.sweep_interval());

    let state = ServiceState {
        validator,
        limiter,
        expenses: Arc::new(ExpenseStore::new()),
    };
    let app = api::expenses_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(
        authority = %config.authority.base_url,
        "mynance-expenses listening on http://{}", bind_addr
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(mynance_web::shutdown_signal())
    .await?;

    sweeper.abort();
    Ok(())
}
