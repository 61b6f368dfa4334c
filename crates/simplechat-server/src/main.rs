mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use simplechat_api::AppStateInner;
use simplechat_core::Engine;
use simplechat_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simplechat=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    info!(
        path = %config.db_path.display(),
        allow_accept_after_reject = config.policy.allow_accept_after_reject,
        "Database ready"
    );

    // Shared state
    let state = Arc::new(AppStateInner {
        engine: Engine::new(db, config.policy),
        jwt_secret: config.jwt_secret,
        token_ttl: config.token_ttl,
    });

    let app = simplechat_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("simplechat server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
