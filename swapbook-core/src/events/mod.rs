//! Node events and the queue that carries them.
//!
//! # Event Flow
//!
//! 1. Gossip listener, wire dispatcher and local API emit `NewOrder` / `CloseOrder`
//! 2. Topology manager emits `AddPeer` / `RemovePeer`
//! 3. `NodeEventLoop` drains the queue and is the only writer of the
//!    order book and the peer set
//!
//! Events carry raw signed bytes; validation happens once, in the loop.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, NodeEventReceiver, NodeEventSender, node_event_channel,
};
pub use types::NodeEvent;
