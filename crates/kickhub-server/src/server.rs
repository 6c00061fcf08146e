use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use kickhub_core::{Envelope, SessionId};
use kickhub_telemetry::MetricsRecorder;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::connection;
use crate::errors::ServerError;
use crate::hub::Hub;
use crate::session::EmissionRate;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub config: Arc<ServerConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectParams {
    session: Option<String>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.cors_origin.as_deref());
    Router::new()
        .route("/ws", get(ws_handler))
        // Pusher clients connect to `/app/{key}`; the key is not checked.
        .route("/app/{key}", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS origin, allowing any");
            CorsLayer::permissive()
        }
    }
}

/// Validate the config, bind, and serve in the background.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, ServerError> {
    let default_rate = EmissionRate::new(config.default_rate)?;
    let metrics = Arc::new(MetricsRecorder::new());
    let hub = Hub::new(config.mailbox_capacity, default_rate, metrics);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let local_addr = listener.local_addr()?;

    let state = AppState {
        hub: Arc::clone(&hub),
        config: Arc::new(config),
    };
    let router = build_router(state);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
        {
            warn!(error = %e, "server exited with error");
        }
    });

    info!(addr = %local_addr, "kickhub listening");

    Ok(ServerHandle {
        port: local_addr.port(),
        hub,
        shutdown,
        server,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub port: u16,
    pub hub: Arc<Hub>,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting, close every client, and wait for the server task.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let closed = self.hub.disconnect_all();
        info!(closed, "shutting down");
        if let Err(e) = self.server.await {
            warn!(error = %e, "server task failed");
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let session_id = SessionId::from_token(params.session.as_deref());
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: SessionId) {
    let (conn, rx) = state.hub.connect(session_id);
    info!(connection_id = %conn.id, session_id = %conn.session_id, "WebSocket client connected");

    let welcome = Envelope::connection_established(
        &conn.id,
        state.config.activity_timeout_secs,
        &conn.session_id,
    );
    state.hub.deliver(&conn, &welcome);

    connection::serve_connection(socket, state.hub, conn, rx).await;
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "connections": state.hub.connection_count(),
        "sessions": state.hub.session_count(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.metrics().snapshot())
}
