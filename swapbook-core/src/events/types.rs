//! Event types flowing into the node event loop.

use bytes::Bytes;
use swapbook_sdk::PeerId;

/// A unit of work for the node event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A peer joined the order book topic.
    AddPeer(PeerId),
    /// A previously subscribed peer has no live connection left.
    RemovePeer(PeerId),
    /// Encoded `SignedLimitOrder`.
    NewOrder { bytes: Bytes, is_mine: bool },
    /// Encoded `SignedRemoveOrder`.
    CloseOrder { bytes: Bytes, is_mine: bool },
}

impl NodeEvent {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeEvent::AddPeer(_) => "add_peer",
            NodeEvent::RemovePeer(_) => "remove_peer",
            NodeEvent::NewOrder { .. } => "new_order",
            NodeEvent::CloseOrder { .. } => "close_order",
        }
    }
}
