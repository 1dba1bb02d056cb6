mod config;
mod db;
mod errors;
mod forms;
mod models;
mod routes;
mod state;
mod store;
mod submissions;
mod uploads;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::kv::{KvStore, MemoryKvStore, RedisKvStore};
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Intake API v{}", env!("CARGO_PKG_VERSION"));

    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    let state = match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let redis_url = config
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the postgres backend")?;

            let store = Arc::new(PgStore::new(create_pool(database_url).await?));

            let redis = redis::Client::open(redis_url)?;
            let kv: Arc<dyn KvStore> = Arc::new(RedisKvStore::connect(&redis).await?);
            info!("Redis connection established");

            AppState {
                forms: store.clone(),
                submissions: store,
                kv,
                s3,
                config: config.clone(),
            }
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            AppState {
                forms: store.clone(),
                submissions: store,
                kv: Arc::new(MemoryKvStore::default()),
                s3,
                config: config.clone(),
            }
        }
    };

    if config.admin_api_token.is_none() {
        info!("ADMIN_API_TOKEN not set; admin routes are open");
    }

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "intake-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
