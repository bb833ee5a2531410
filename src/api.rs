//! Read-only HTTP endpoints describing the relay's current state.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::connection::{ConnectionId, ConnectionStatus};
use crate::state::AppState;

/// One connected client as seen from the outside
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub id: ConnectionId,
    pub name: String,
    pub status: ConnectionStatus,
    pub connected_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: usize,
}

/// List connected clients.
///
/// GET /api/clients
pub async fn list_clients(State(state): State<Arc<AppState>>) -> Json<Vec<ClientInfo>> {
    let mut clients: Vec<ClientInfo> = state
        .registry
        .snapshot_all()
        .await
        .into_iter()
        .map(|c| ClientInfo {
            id: c.id(),
            name: c.name().to_string(),
            status: c.status(),
            connected_at: c.connected_at().to_rfc3339(),
        })
        .collect();
    clients.sort_by(|a, b| a.connected_at.cmp(&b.connected_at).then(a.id.cmp(&b.id)));
    Json(clients)
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.registry.len().await,
    })
}
