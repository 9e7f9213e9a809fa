use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod extract;
mod profile;
mod state;
mod users;

use crate::{config::AppConfig, state::AppState, users::PgUserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "loyalty_backend=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::debug!(host = %config.host, port = config.port, jwt = ?config.jwt, "configuration loaded");

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;

    let state = AppState::from_parts(Arc::new(PgUserStore::new(pool)), &config.jwt);
    app::serve(app::build_app(state), &config).await
}
