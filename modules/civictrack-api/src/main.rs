use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use civictrack_api::{build_router, jwt::JwtService, AppState};
use civictrack_common::Config;
use civictrack_engine::{BlobStore, CivicTrack, LocalBlobStore, SearchPolicy};
use civictrack_store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.upload_dir));
    let policy = SearchPolicy {
        max_radius_km: config.max_search_radius_km,
        default_radius_km: config.default_search_radius_km,
    };

    let state = Arc::new(AppState {
        core: CivicTrack::new(store.clone(), store.clone(), blobs, policy),
        users: store.clone(),
        jwt: JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
        config: config.clone(),
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("CivicTrack API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("CivicTrack API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
