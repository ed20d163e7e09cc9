//! NodeEventLoop processor.
//!
//! The NodeEventLoop is the single writer of node state:
//! - Applies `NewOrder` / `CloseOrder` events to the order book
//! - Maintains the set of subscribed peers from `AddPeer` / `RemovePeer`
//!
//! Events are handled strictly one at a time, in arrival order. Readers of
//! the peer set get snapshots through a `watch` channel.

use kanau::processor::Processor;
use std::collections::HashSet;
use std::convert::Infallible;
use swapbook_sdk::PeerId;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::events::{NodeEvent, NodeEventReceiver};
use crate::orderbook::OrderBook;

// ---------------------------------------------------------------------------
// PeerSet
// ---------------------------------------------------------------------------

/// Peers currently subscribed to the order book topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet {
    peers: HashSet<PeerId>,
}

impl PeerSet {
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.iter()
    }
}

impl FromIterator<PeerId> for PeerSet {
    fn from_iter<I: IntoIterator<Item = PeerId>>(iter: I) -> Self {
        Self {
            peers: iter.into_iter().collect(),
        }
    }
}

/// Read side of the peer set.
pub type PeerSetWatch = watch::Receiver<PeerSet>;

// ---------------------------------------------------------------------------
// NodeEventLoop
// ---------------------------------------------------------------------------

pub struct NodeEventLoop {
    order_book: OrderBook,
    peers: watch::Sender<PeerSet>,
}

impl NodeEventLoop {
    pub fn new(order_book: OrderBook) -> (Self, PeerSetWatch) {
        let (peers, peers_rx) = watch::channel(PeerSet::default());
        (Self { order_book, peers }, peers_rx)
    }

    /// Drain `event_rx` until shutdown or until every sender is gone.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, mut event_rx: NodeEventReceiver) {
        info!("Node event loop started");
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Node event loop received shutdown signal");
                        break;
                    }
                }

                Some(event) = event_rx.recv() => {
                    let _ = self.process(event).await;
                }

                else => {
                    info!("Node event channel closed");
                    break;
                }
            }
        }
        info!("Node event loop shutdown complete");
    }
}

impl Processor<NodeEvent> for NodeEventLoop {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, event: NodeEvent) -> Result<(), Infallible> {
        debug!(event = event.kind(), "Processing node event");
        match event {
            NodeEvent::AddPeer(peer) => {
                let short = peer.short().to_string();
                if self.peers.send_if_modified(|set| set.peers.insert(peer)) {
                    info!(peer = %short, "New subscriber peer");
                }
            }
            NodeEvent::RemovePeer(peer) => {
                if self.peers.send_if_modified(|set| set.peers.remove(&peer)) {
                    info!(peer = %peer.short(), "Lost subscriber peer");
                }
            }
            NodeEvent::NewOrder { bytes, is_mine } => {
                self.order_book.process_incoming_order(&bytes, is_mine).await;
            }
            NodeEvent::CloseOrder { bytes, is_mine } => {
                self.order_book.process_withdrawal(&bytes, is_mine).await;
            }
        }
        Ok(())
    }
}
