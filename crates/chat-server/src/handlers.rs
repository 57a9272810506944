//! Connection handlers for the chat server.
//!
//! This module handles the connection lifecycle and feeds inbound frames to
//! the message router.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::StreamExt;
use prochord_chat_core::{MessageRouter, RoomDirectory, RouterConfig};
use prochord_chat_transport::websocket::write_loop;
use prochord_chat_transport::{ConnectionId, Session, WebSocketSession};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The message router.
    pub router: MessageRouter,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state with an empty room directory.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let router_config = RouterConfig {
            max_message_size: config.limits.max_message_size,
        };

        Self {
            router: MessageRouter::with_config(Arc::new(RoomDirectory::new()), router_config),
            config,
        }
    }
}

/// Query parameters of the WebSocket endpoint.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Name the connection speaks as.
    pub username: Option<String>,
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    let websocket_path = state.config.transport.websocket_path.clone();
    Router::new()
        .route(&websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Chat server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}?username=<name>",
        addr, config.transport.websocket_path
    );

    serve(listener, Arc::new(AppState::new(config))).await
}

/// Serve on an already bound listener.
///
/// # Errors
///
/// Returns an error if serving fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Room statistics handler.
async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.router.directory().stats();
    axum::Json(serde_json::json!({
        "rooms": stats.room_count,
        "participants": stats.participant_count
    }))
}

/// WebSocket upgrade handler.
///
/// The username normally comes from the platform's login session; here it
/// is taken from the `username` query parameter.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    let Some(username) = query.username.filter(|name| !name.trim().is_empty()) else {
        warn!("WebSocket upgrade without username rejected");
        return StatusCode::BAD_REQUEST.into_response();
    };

    ws.on_upgrade(move |socket| handle_websocket(socket, state, username))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, username: String) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();
    debug!(connection = %connection_id, username = %username, "WebSocket connected");

    let (sink, mut stream) = socket.split();
    let (session, outbound) = WebSocketSession::new(connection_id.clone());
    let session = Arc::new(session);
    let handle: Arc<dyn Session> = session.clone();
    let writer = tokio::spawn(write_loop(connection_id.clone(), sink, outbound));

    if let Err(e) = state.router.connect(handle.as_ref()) {
        error!(connection = %connection_id, error = %e, "Failed to send candidate room id");
        metrics::record_error("new_id");
    }

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => process(&state, &handle, &username, text.as_bytes()),
            Ok(Message::Binary(data)) => process(&state, &handle, &username, &data),
            Ok(Message::Ping(data)) => {
                if session.pong(data).is_err() {
                    break;
                }
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!(connection = %connection_id, "Received close frame");
                break;
            }
            Err(e) => {
                warn!(connection = %connection_id, error = %e, "WebSocket error");
                metrics::record_error("websocket");
                break;
            }
        }

        if !session.is_open() {
            debug!(connection = %connection_id, "Session closed after EXIT");
            break;
        }
    }

    // Without an EXIT the connection may still be registered somewhere
    state.router.disconnect(&connection_id);
    metrics::set_active_rooms(state.router.directory().len());

    if let Err(e) = session.close() {
        debug!(connection = %connection_id, error = %e, "Session already gone");
    }
    drop(handle);
    drop(session);
    if let Err(e) = writer.await {
        warn!(connection = %connection_id, error = %e, "Writer task failed");
    }

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Dispatch one inbound frame.
fn process(state: &AppState, session: &Arc<dyn Session>, username: &str, data: &[u8]) {
    let start = Instant::now();

    match state.router.handle(session, username, data) {
        Some(outcome) => {
            metrics::record_message(data.len(), outcome.message_type.as_str());
            metrics::record_deliveries(outcome.broadcast.delivered, outcome.broadcast.failed);
        }
        None => {
            metrics::record_message(data.len(), "dropped");
            metrics::record_error("dropped");
        }
    }

    metrics::set_active_rooms(state.router.directory().len());
    metrics::record_latency(start.elapsed().as_secs_f64());
}
