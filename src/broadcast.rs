use axum::extract::ws::Message;

use crate::connection::ConnectionId;
use crate::registry::{Registry, Visit};

/// Outcome of one broadcast sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Fan a message out to every registered connection except `sender`.
///
/// The whole pass runs under the registry lock, so nobody joins or leaves
/// mid-sweep. Pushes never wait: a peer whose queue is full or gone is closed
/// and removed on the spot. Delivery is best effort, at most once.
pub async fn broadcast(registry: &Registry, sender: ConnectionId, message: Message) -> BroadcastReport {
    let mut delivered = 0;

    let evicted = registry
        .sweep(|peer| {
            if peer.id() == sender {
                return Visit::Keep;
            }
            match peer.try_send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    Visit::Keep
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to deliver to {} ({}), evicting: {}",
                        peer.name(),
                        peer.id(),
                        e
                    );
                    Visit::Evict
                }
            }
        })
        .await;

    let report = BroadcastReport {
        delivered,
        evicted: evicted.len(),
    };
    tracing::debug!(
        "Broadcast from {}: {} delivered, {} evicted",
        sender,
        report.delivered,
        report.evicted
    );
    report
}
