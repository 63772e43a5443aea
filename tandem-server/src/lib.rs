mod config;
mod health;
mod room;
mod signaling;

pub use config::*;
pub use health::*;
pub use room::*;
pub use signaling::*;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared state of the signaling endpoint.
pub struct AppState {
    pub signaling: SignalingService,
    pub room_manager: RoomManager,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Arc<Self> {
        let signaling = SignalingService::new(config.ice_servers.clone());
        let room_manager = RoomManager::new(Arc::new(signaling.clone()), config.room.clone());

        Arc::new(Self {
            signaling,
            room_manager,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/{peer_id}", get(ws_handler))
        .route("/test", get(health_handler))
        .layer(cors)
        .with_state(state)
}

/// Serves signaling on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("Signaling server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("signaling server failed")
}

/// Binds `config.bind` and serves until `shutdown` resolves.
pub async fn run<F>(config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let state = AppState::new(&config);
    serve(listener, state, shutdown).await
}
