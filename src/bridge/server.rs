//! HTTP server and routing for the bridge

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{connection, BridgeState};

/// Create the Axum router for the bridge.
pub fn create_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the bridge on an already-bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<BridgeState>,
) -> anyhow::Result<()> {
    tracing::info!("Bridge listening on {}", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<BridgeState>>) -> Response {
    ws.on_upgrade(move |socket| connection::handle_socket(socket, state))
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<BridgeState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "connections": state.connection_count().await,
        })
        .to_string(),
    )
}
