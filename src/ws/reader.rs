use axum::extract::ws::Message;
use futures::stream::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

use crate::broadcast::broadcast;
use crate::connection::{wait_closed, Connection};
use crate::error::PeerError;
use crate::registry::Registry;

/// Read frames from one peer until it leaves, fails, or goes quiet.
///
/// Every inbound frame (pongs included) pushes the read deadline out by
/// `keepalive`. Data frames are broadcast to every other connection.
/// Returns `Ok` on an orderly end: close frame, end of stream, or the
/// connection being closed from elsewhere.
pub async fn read_loop<St>(
    mut stream: St,
    conn: &Connection,
    registry: &Registry,
    keepalive: Duration,
) -> Result<(), PeerError>
where
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut closed = conn.closed_signal();
    let mut deadline = Instant::now() + keepalive;

    loop {
        let next = tokio::select! {
            _ = wait_closed(&mut closed) => return Ok(()),
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
        };

        let msg = match next {
            Err(_) => return Err(PeerError::DeadlineExceeded(keepalive)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(PeerError::Read(e)),
            Ok(Some(Ok(msg))) => msg,
        };

        deadline = Instant::now() + keepalive;

        match msg {
            Message::Text(_) | Message::Binary(_) => {
                tracing::debug!(
                    "Message from {} ({}): {} bytes",
                    conn.name(),
                    conn.id(),
                    payload_len(&msg)
                );
                broadcast(registry, conn.id(), msg).await;
            }
            // tungstenite answers pings on its own
            Message::Ping(_) => {}
            Message::Pong(_) => {
                tracing::trace!("Pong from {}", conn.id());
            }
            Message::Close(frame) => {
                tracing::info!("Client {} initiated close: {:?}", conn.id(), frame);
                return Ok(());
            }
        }
    }
}

fn payload_len(msg: &Message) -> usize {
    match msg {
        Message::Text(t) => t.len(),
        Message::Binary(b) => b.len(),
        _ => 0,
    }
}
