//! Axum-based HTTP + WebSocket server.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{
        ws::rejection::WebSocketUpgradeRejection, Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::connection::handle_ws_connection;
use crate::state::GatewayState;

/// Build the gateway router.
///
/// Drawing clients may upgrade on `/` or `/ws`; a plain `GET /` is the
/// process status endpoint.
pub fn router(state: Arc<GatewayState>) -> Router {
    let cors = state.config.cors_enabled();

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/ws", get(ws_handler))
        .route("/room/{room_id}", get(room_handler))
        .route("/health", get(health_handler));

    #[cfg(feature = "metrics")]
    {
        app = app.route("/metrics", get(metrics_handler));
    }

    if cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn start_gateway(state: Arc<GatewayState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("Server running on {addr}");

    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<GatewayState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn root_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    match ws {
        Ok(ws) => upgrade(ws, state),
        Err(_) => status_handler(state).await,
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    upgrade(ws, state)
}

fn upgrade(ws: WebSocketUpgrade, state: Arc<GatewayState>) -> Response {
    let max_frame_bytes = state.config.max_frame_bytes();
    ws.max_message_size(max_frame_bytes)
        .on_upgrade(move |socket| handle_ws_connection(state, socket))
}

async fn status_handler(state: Arc<GatewayState>) -> Response {
    let stats = match state.relay.stats().await {
        Ok(stats) => stats,
        Err(e) => return relay_unavailable(e),
    };

    Json(json!({
        "status": "Server is running",
        "activeRooms": stats.active_rooms,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
    .into_response()
}

async fn room_handler(
    Path(room_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    match state.relay.room_status(&room_id).await {
        Ok(Some(status)) => Json(json!({
            "exists": true,
            "userCount": status.user_count,
            "drawHistoryLength": status.draw_history_length,
        }))
        .into_response(),
        Ok(None) => Json(json!({ "exists": false })).into_response(),
        Err(e) => relay_unavailable(e),
    }
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Response {
    let version = env!("CARGO_PKG_VERSION");
    let stats = match state.relay.stats().await {
        Ok(stats) => stats,
        Err(e) => return relay_unavailable(e),
    };

    Json(json!({
        "status": "ok",
        "version": version,
        "connections": stats.connections,
        "startedAt": state.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
    .into_response()
}

#[cfg(feature = "metrics")]
async fn metrics_handler(State(state): State<Arc<GatewayState>>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

fn relay_unavailable(e: sketch_relay_rooms::RelayClosed) -> Response {
    error!(%e, "Status query failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "unavailable", "error": e.to_string() })),
    )
        .into_response()
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(%e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    }
}
