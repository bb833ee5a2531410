use axum::extract::ws::Message;
use futures::sink::{Sink, SinkExt};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::connection::{wait_closed, Connection};
use crate::error::PeerError;

/// Upper bound for flushing the final close frame to a peer that may be dead
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drain the connection's outbound queue into the socket.
///
/// Stops when the connection is closed, even in the middle of a send to a
/// peer that stopped reading, then sends a close frame. A write error is
/// logged and closes the connection so the read loop tears it down; it never
/// reaches other peers.
pub async fn write_loop<S>(mut sink: S, mut rx: mpsc::Receiver<Message>, conn: Connection)
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let mut closed = conn.closed_signal();

    loop {
        let msg = tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let sent = tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => break,
            sent = sink.send(msg) => sent,
        };

        if let Err(e) = sent {
            tracing::warn!(
                "Write to {} ({}) failed: {}",
                conn.name(),
                conn.id(),
                PeerError::Write(e)
            );
            conn.close();
            return;
        }
    }

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(None))).await {
        Ok(Ok(())) => {}
        // Peer already closed its side
        Ok(Err(e)) => tracing::debug!("Close frame to {} not sent: {}", conn.id(), e),
        Err(_) => tracing::debug!("Timed out sending close frame to {}", conn.id()),
    }
}
