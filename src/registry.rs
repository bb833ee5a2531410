//! The set of live connections.
//!
//! The map is never handed out. Every insert, delete and full iteration goes
//! through one `tokio::sync::Mutex`, so a sweep never observes a
//! half-registered or half-removed peer.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::connection::{Connection, ConnectionId};

/// Verdict returned by a sweep visitor for each connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    /// Close the connection and drop it from the registry within the same sweep
    Evict,
}

#[derive(Clone, Default)]
pub struct Registry {
    members: Arc<Mutex<HashMap<ConnectionId, Connection>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, conn: Connection) {
        let mut members = self.members.lock().await;
        members.insert(conn.id(), conn.clone());
        tracing::debug!(
            "Registered {} ({}), {} connections",
            conn.name(),
            conn.id(),
            members.len()
        );
    }

    /// Remove a connection. Absent ids are a no-op, so racing eviction paths
    /// (a failed broadcast and the peer's own teardown) can both call this.
    pub async fn unregister(&self, id: ConnectionId) -> Option<Connection> {
        let mut members = self.members.lock().await;
        let removed = members.remove(&id);
        if removed.is_some() {
            tracing::debug!("Unregistered {}, {} connections", id, members.len());
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.lock().await.contains_key(&id)
    }

    /// Clone every handle while holding the lock
    pub async fn snapshot_all(&self) -> Vec<Connection> {
        self.members.lock().await.values().cloned().collect()
    }

    /// Clone every handle except `excluded` while holding the lock
    pub async fn snapshot_excluding(&self, excluded: ConnectionId) -> Vec<Connection> {
        self.members
            .lock()
            .await
            .values()
            .filter(|c| c.id() != excluded)
            .cloned()
            .collect()
    }

    /// Visit every connection with the lock held for the whole pass.
    ///
    /// Connections the visitor marks [`Visit::Evict`] are closed and removed
    /// before the lock is released. Returns the evicted handles.
    pub async fn sweep<F>(&self, mut visit: F) -> Vec<Connection>
    where
        F: FnMut(&Connection) -> Visit,
    {
        let mut members = self.members.lock().await;
        let mut evicted = Vec::new();
        members.retain(|_, conn| match visit(conn) {
            Visit::Keep => true,
            Visit::Evict => {
                conn.close();
                evicted.push(conn.clone());
                false
            }
        });
        evicted
    }
}
