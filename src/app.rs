/*
 * Responsibility
 * - Logging init -> Config -> dependencies -> Router
 * - Router-wide middleware (security headers / CORS / request id, trace, limits)
 * - axum::serve()
 */
use anyhow::Result;
use axum::Router;

use crate::{
    api,
    config::Config,
    middleware,
    services::{access::AccessPolicy, identity::build_identity_provider},
    state::AppState,
};

pub async fn run() -> Result<()> {
    init_logging();

    let config = Config::from_env()?;
    let identity = build_identity_provider(&config.identity)?;
    let state = AppState::new(identity, AccessPolicy::new(config.root_email.clone()));

    if let Some(root) = state.access.root_email() {
        tracing::warn!(root_email = %root, "root email bypass is enabled");
    }

    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, env = ?config.app_env, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_admin=info,tower_http=info".into()),
        )
        .init();
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes(&state).with_state(state);
    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router)
}
