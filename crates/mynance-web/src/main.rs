//! `mynance-auth`: the token authority.

use std::net::SocketAddr;

use mynance_web::api;
use mynance_web::config::AuthorityConfig;
use mynance_web::state::AuthorityState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mynance_web::init_tracing();

    let config = AuthorityConfig::load()?;
    let bind_addr = config.bind_addr;
    let sweep_every = config.rate_limit.sweep_interval();
    let account_count = config.accounts.len();

    let state = AuthorityState::from_config(config).await?;
    tracing::info!(accounts = account_count, "credential store ready");

    // Idle-bucket eviction; the tasks end once the limiters are dropped.
    let sweepers = [
        state.limiter.spawn_sweeper(sweep_every),
        state.login_limiter.spawn_sweeper(sweep_every),
        state.service_limiter.spawn_sweeper(sweep_every),
    ];

    let app = api::authority_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("mynance-auth listening on http://{}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(mynance_web::shutdown_signal())
    .await?;

    for sweeper in sweepers {
        sweeper.abort();
    }
    Ok(())
}
