//! Node configuration shared by every processor.
//!
//! The server crate owns loading and validation; this module only carries
//! the resolved values and the protocol constants.

use std::time::Duration;
use swapbook_sdk::ContentId;

use crate::net::PeerInfo;

/// Gossip topic that carries order book traffic.
pub const ORDER_BOOK_TOPIC: &str = "OrderBook";

/// Seed hashed into the rendezvous key that nodes advertise and query.
pub const RENDEZVOUS_SEED: &str = "floodsub:OrderBook";

/// Protocol name for direct peer streams.
pub const SWAP_PROTOCOL: &str = "/atomicswap/1.0.0";

/// How long a locally created order stays live.
pub const DEFAULT_ORDER_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Resolved node settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Below this many subscribed peers the topology manager runs discovery.
    pub min_subscribers: usize,
    /// Maximum providers requested per discovery round.
    pub provider_query_limit: usize,
    /// Per-candidate connect timeout.
    pub dial_timeout: Duration,
    /// Period of the connectivity maintenance tick.
    pub reconnect_interval: Duration,
    /// Period for re-announcing ourselves under the rendezvous key.
    pub resubscribe_interval: Duration,
    /// Period of the expired-order sweep.
    pub gc_interval: Duration,
    /// Lifetime given to orders created by this node.
    pub order_ttl: Duration,
    /// Ask each newly connected peer for a full order book dump.
    pub request_snapshot_on_connect: bool,
    /// Capacity of the node event queue.
    pub event_buffer: usize,
    pub topic: String,
    pub rendezvous_seed: String,
    /// Peers dialed once at startup, before the first discovery round.
    pub bootstrap_peers: Vec<PeerInfo>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            min_subscribers: 2,
            provider_query_limit: 10,
            dial_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(60),
            resubscribe_interval: Duration::from_secs(60 * 60),
            gc_interval: Duration::from_secs(60),
            order_ttl: DEFAULT_ORDER_TTL,
            request_snapshot_on_connect: true,
            event_buffer: crate::events::DEFAULT_CHANNEL_BUFFER,
            topic: ORDER_BOOK_TOPIC.to_string(),
            rendezvous_seed: RENDEZVOUS_SEED.to_string(),
            bootstrap_peers: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Content key under which order book participants advertise themselves.
    pub fn rendezvous_key(&self) -> ContentId {
        ContentId::of(self.rendezvous_seed.as_bytes())
    }
}
