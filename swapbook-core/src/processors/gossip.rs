//! GossipListener processor.
//!
//! Turns messages from the order book topic into node events. Anything that
//! is not a limit order or a withdrawal is ignored.

use bytes::Bytes;
use swapbook_sdk::objects::{Envelope, MessageType, SignedLimitOrder, SignedRemoveOrder, WireObject};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::events::{NodeEvent, NodeEventSender};
use crate::net::GossipMessage;

pub struct GossipListener {
    events: NodeEventSender,
}

impl GossipListener {
    pub fn new(events: NodeEventSender) -> Self {
        Self { events }
    }

    /// Map a gossip message to the event it should produce.
    pub fn route(message: &GossipMessage) -> Option<NodeEvent> {
        let from = message.from.short();
        let envelope = match Envelope::from_bytes(&message.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(peer = %from, error = %e, "Dropping undecodable gossip message");
                return None;
            }
        };

        let routed = match envelope.message_type() {
            MessageType::LimitOrder => envelope
                .payload_bytes::<SignedLimitOrder>()
                .map(|bytes| NodeEvent::NewOrder {
                    bytes: Bytes::copy_from_slice(bytes),
                    is_mine: false,
                }),
            MessageType::OrderClose => envelope
                .payload_bytes::<SignedRemoveOrder>()
                .map(|bytes| NodeEvent::CloseOrder {
                    bytes: Bytes::copy_from_slice(bytes),
                    is_mine: false,
                }),
            other => {
                debug!(peer = %from, message_type = %other, "Ignoring gossip message");
                return None;
            }
        };

        routed
            .map_err(|e| warn!(peer = %from, error = %e, "Dropping gossip message with bad payload"))
            .ok()
    }

    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut subscription: mpsc::Receiver<GossipMessage>,
    ) {
        info!("Gossip listener started");
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Gossip listener received shutdown signal");
                        break;
                    }
                }

                Some(message) = subscription.recv() => {
                    let Some(event) = Self::route(&message) else {
                        continue;
                    };
                    if self.events.send(event).await.is_err() {
                        warn!("Node event channel closed, stopping gossip listener");
                        break;
                    }
                }

                else => {
                    info!("Gossip subscription closed");
                    break;
                }
            }
        }
        info!("Gossip listener shutdown complete");
    }
}
