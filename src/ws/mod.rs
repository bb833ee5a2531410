pub mod reader;
pub mod writer;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
    Extension,
};
use futures::stream::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::auth::Claims;
use crate::connection::Connection;
use crate::error::RelayError;
use crate::state::AppState;

/// How long teardown waits for the writer before aborting it
const WRITER_SHUTDOWN: Duration = Duration::from_secs(1).saturating_add(writer::CLOSE_TIMEOUT);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Display name; not required to be unique
    pub name: Option<String>,
}

/// WebSocket upgrade handler.
///
/// Runs behind the bearer and origin middleware, so by the time it is called
/// the credential has been verified and `Claims` sit in the extensions.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Query(params): Query<WsQuery>,
    Extension(claims): Extension<Claims>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            let err = RelayError::UpgradeFailed(rejection.to_string());
            tracing::error!("Rejected upgrade request: {}", err);
            return err.into_response();
        }
    };

    let name = display_name(params.name, &claims);
    tracing::info!("WebSocket connection request from {} (subject {:?})", name, claims.sub);

    ws.on_failed_upgrade(|e: axum::Error| {
        tracing::error!("WebSocket handshake failed: {}", RelayError::UpgradeFailed(e.to_string()));
    })
    .on_upgrade(move |socket| handle_socket(socket, name, state))
}

/// Pick the name shown for a client: the `name` query parameter, else the
/// token subject, else a placeholder.
fn display_name(requested: Option<String>, claims: &Claims) -> String {
    requested
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .or_else(|| claims.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Run one connection from registration to teardown
async fn handle_socket(socket: WebSocket, name: String, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel(state.config.outbound_capacity);
    let conn = Connection::new(name, tx);

    state.registry.register(conn.clone()).await;
    tracing::info!("Client connected: {} ({})", conn.name(), conn.id());

    let mut writer = tokio::spawn(writer::write_loop(sink, rx, conn.clone()));

    let result = reader::read_loop(
        stream,
        &conn,
        &state.registry,
        state.config.keepalive_window,
    )
    .await;

    state.registry.unregister(conn.id()).await;
    conn.close();

    match tokio::time::timeout(WRITER_SHUTDOWN, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Writer task for {} failed: {}", conn.id(), e),
        Err(_) => {
            tracing::warn!("Writer for {} did not stop, aborting it", conn.id());
            writer.abort();
        }
    }

    match result {
        Ok(()) => tracing::info!("Client disconnected: {} ({})", conn.name(), conn.id()),
        Err(e) => tracing::info!("Client dropped: {} ({}): {}", conn.name(), conn.id(), e),
    }
}
