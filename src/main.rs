//! Entry point: load config, wire dependencies, and run the server.

use inkwell::config::Config;
use inkwell::db;
use inkwell::repositories::RedisRepository;
use inkwell::{create_app, AppState};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;
    tracing::info!("migrations applied");

    let redis = match &config.redis_url {
        Some(url) => {
            let repo = RedisRepository::new(url)?;
            if let Err(e) = repo.ping().await {
                tracing::warn!(error = %e, "redis unreachable; using in-process fallbacks");
            }
            Some(Arc::new(repo))
        }
        None => {
            tracing::info!("REDIS_URL not set; using in-process fallbacks");
            None
        }
    };

    let addr = config.server_addr;
    let state = AppState::new(config, db_pool, redis)?;
    tracing::info!(upload_backend = state.store().name(), "state ready");

    let app = create_app(state).layer(TraceLayer::new_for_http());

    tracing::info!(addr = %addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
