use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use super::api::{self, AppState};
use super::db::{BoardDb, DbHandle};
use super::ws;
use crate::ordering::{OrderingPolicy, Reorderer};

/// Configuration for the board server.
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub policy: OrderingPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3142,
            db_path: PathBuf::from(".taskorder/board.db"),
            dev_mode: false,
            policy: OrderingPolicy::default(),
        }
    }
}

/// Build shared state over an opened database.
pub fn build_state(db: BoardDb, policy: OrderingPolicy) -> Arc<AppState> {
    let db = DbHandle::new(db.with_policy(policy));
    let (ws_tx, _rx) = broadcast::channel::<String>(256);
    Arc::new(AppState {
        reorderer: Reorderer::new(Arc::new(db.clone()), policy),
        db,
        ws_tx,
    })
}

/// Build the full application router with API and WebSocket routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let ws_tx = state.ws_tx.clone();

    api::api_router()
        .route(
            "/ws",
            get(move |ws_upgrade| ws::ws_handler_with_sender(ws_upgrade, ws_tx)),
        )
        .with_state(state)
}

/// Start the board server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = BoardDb::new(&config.db_path).context("Failed to initialize board database")?;
    let state = build_state(db, config.policy);

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(
        addr = %local_addr,
        db = %config.db_path.display(),
        dev = config.dev_mode,
        "board server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
