// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr, time::Duration};

use docchat_gatekeeper::{
    api::router,
    auth::{Principal, Role},
    config::GatekeeperConfig,
    state::AppState,
    telemetry::{init_tracing, LogFormat},
};

/// Seed admin for bootstrap; both must be set.
const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
const SEED_ADMIN_API_KEY_ENV: &str = "SEED_ADMIN_API_KEY";

/// How often idle quota windows are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(600);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing(LogFormat::from_env())?;

    let config = GatekeeperConfig::from_env()?;
    tracing::info!(
        bypass_enabled = config.bypass.is_active(),
        login_max = config.rate_limits.login.max_count,
        message_max = config.rate_limits.message.max_count,
        api_key_header = %config.api_key_header,
        "configuration loaded"
    );

    let state = AppState::new(config);
    seed_admin(&state).await?;
    spawn_pruner(&state);

    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port).parse()?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "DocChat gatekeeper listening (docs at /docs)");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn seed_admin(state: &AppState) -> Result<(), BoxError> {
    let (Ok(email), Ok(api_key)) = (env::var(SEED_ADMIN_EMAIL_ENV), env::var(SEED_ADMIN_API_KEY_ENV))
    else {
        return Ok(());
    };

    let admin = Principal::new("admin", Role::Admin)
        .with_email(email)
        .with_api_key(api_key);
    state.directory.insert(admin).await?;
    tracing::info!("seed admin registered");
    Ok(())
}

fn spawn_pruner(state: &AppState) {
    let limiter = state.limiter.clone();
    let max_window_hours = state.config.rate_limits.max_window_hours();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let pruned = limiter.prune_expired(max_window_hours);
            if pruned > 0 {
                tracing::debug!(pruned, "pruned expired rate-limit windows");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
