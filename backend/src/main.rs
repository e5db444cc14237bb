use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod domain;
mod rest;
mod storage;

use domain::{ActivityService, FamilyService, LedgerService};
use rest::AppState;
use storage::{
    DbConnection, SqliteActivitySink, SqliteDirectoryStore, SqliteMovementStore,
    SqliteSnapshotStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Setting up database");
    let db = match std::env::var("DATABASE_URL") {
        Ok(url) => DbConnection::new(&url).await?,
        Err(_) => DbConnection::init().await?,
    };

    let activity = ActivityService::new(Arc::new(SqliteActivitySink::new(db.clone())));
    let family = FamilyService::new(Arc::new(SqliteDirectoryStore::new(db.clone())))
        .with_activity(activity.clone());
    let ledger = LedgerService::new()
        .with_movement_store(Arc::new(SqliteMovementStore::new(db.clone())))
        .with_snapshot_store(Arc::new(SqliteSnapshotStore::new(db)))
        .with_activity(activity.clone());

    let state = AppState::new(ledger, family, activity);

    // CORS setup to allow the frontend to make requests
    let allowed_origin =
        std::env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", rest::router())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
