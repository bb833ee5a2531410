//! Handle to one authenticated peer.
//!
//! A `Connection` is cheap to clone. All clones share the same outbound queue
//! and the same close signal, so whichever path notices a failure first
//! (broadcast, read loop, write loop) can close it and the rest observe it.

use axum::extract::ws::Message;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::error::SendError;

/// Registry key. Minted fresh for every upgraded socket, so two peers with the
/// same display name are still distinct connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(ulid::Ulid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Online,
}

#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    name: Arc<str>,
    status: ConnectionStatus,
    authenticated: bool,
    connected_at: chrono::DateTime<chrono::Utc>,
    outbound: mpsc::Sender<Message>,
    closed: Arc<watch::Sender<bool>>,
}

impl Connection {
    /// Create a handle for a peer whose credential has been verified.
    /// Frames pushed with [`Connection::try_send`] end up in `outbound`'s receiver.
    pub fn new(name: impl Into<String>, outbound: mpsc::Sender<Message>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: ConnectionId::new(),
            name: Arc::from(name.into()),
            status: ConnectionStatus::Online,
            authenticated: true,
            connected_at: chrono::Utc::now(),
            outbound,
            closed: Arc::new(closed),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn connected_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.connected_at
    }

    /// Queue a frame without waiting. A full queue is reported rather than
    /// awaited so that one slow reader never stalls the caller.
    pub fn try_send(&self, message: Message) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Disconnected);
        }
        self.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Disconnected,
        })
    }

    /// Close the connection. Only the first call has an effect and returns true.
    pub fn close(&self) -> bool {
        self.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Subscribe to the close signal. The receiver sees `true` once closed,
    /// including when the close happened before subscribing.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Resolves once the connection has been closed
pub async fn wait_closed(signal: &mut watch::Receiver<bool>) {
    // Err means every sender is gone, which only happens once all handles dropped
    let _ = signal.wait_for(|closed| *closed).await;
}
