mod auth;
mod config;
mod db;
mod errors;
mod extract;
mod interview;
mod llm_client;
mod models;
mod orchestrator;
mod pipeline;
mod profiles;
mod rate_limit;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::verifier_from_config;
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::{AnthropicBackend, OracleClient, RetryPolicy};
use crate::orchestrator::Orchestrator;
use crate::profiles::HttpProfileSource;
use crate::rate_limit::RateLimiter;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{CacheStore, KvBackend, PgRecordStore, RedisKv};

const REDIS_OP_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareerFit API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // Initialize Redis. An unreachable Redis is not fatal: the cache misses
    // and the limiter admits until it comes back.
    let redis = RedisKv::new(redis::Client::open(config.redis_url.clone())?, REDIS_OP_TIMEOUT);
    match redis.ping().await {
        Ok(()) => info!("Redis client initialized"),
        Err(e) => warn!("Redis not reachable at startup, continuing degraded: {e}"),
    }
    let kv: Arc<dyn KvBackend> = Arc::new(redis);

    // Initialize oracle client
    let backend = AnthropicBackend::new(config.anthropic_api_key.clone())?;
    let oracle = OracleClient::new(Arc::new(backend), RetryPolicy::from(config.oracle));
    info!(
        "Oracle client initialized (model: {}, attempts: {})",
        llm_client::anthropic::MODEL,
        config.oracle.max_attempts
    );

    let orchestrator = Orchestrator::new(
        oracle,
        CacheStore::new(Some(kv.clone()), config.analysis_ttl, config.session_ttl),
        RateLimiter::new(kv, config.per_caller_limit, config.global_limit),
        Arc::new(PgRecordStore::new(db)),
        Arc::new(HttpProfileSource::new()?),
    );

    // Build app state
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        verifier: verifier_from_config(&config)?,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
