//! Long-running processors of a node.
//!
//! - `NodeEventLoop`: drains `NodeEvent`s, sole writer of the order book and peer set
//! - `TopologyManager`: rendezvous, discovery and connectivity maintenance, emits `AddPeer` / `RemovePeer`
//! - `GossipListener`: order book topic messages, emits `NewOrder` / `CloseOrder`
//! - `ExpirySweeper`: periodic removal of expired orders

pub mod event_loop;
pub mod expiry_sweeper;
pub mod gossip;
pub mod topology;

pub use event_loop::{NodeEventLoop, PeerSet, PeerSetWatch};
pub use expiry_sweeper::ExpirySweeper;
pub use gossip::GossipListener;
pub use topology::{MaintenanceReport, PeerState, TopologyManager};
