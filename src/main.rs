use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use drive_backend::auth::identity::IdentityService;
use drive_backend::auth::jwt::JwtService;
use drive_backend::config::AppConfig;
use drive_backend::db;
use drive_backend::routes::create_router;
use drive_backend::state::AppState;
use drive_backend::storage::S3Storage;
use drive_backend::store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        public_base_url = %config.public_base_url,
        s3_bucket = %config.s3_bucket,
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    if applied > 0 {
        tracing::info!(applied, "applied pending migrations");
    }

    let pg_store = Arc::new(PgStore::new(pool));
    let storage = Arc::new(S3Storage::from_config(&config).await?);
    let jwt = JwtService::from_config(&config)?;
    let identity = IdentityService::new(jwt, pg_store.clone());

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(config, pg_store, storage, identity);
    let router = create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
