//! TOML file configuration structures.
//!
//! These structs map directly to the `swapbook.toml` file format. Every
//! field is optional; a missing file behaves like an empty one.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub node: NodeSection,
    pub api: ApiSection,
    pub network: NetworkSection,
}

/// Node tunables. Durations are in seconds unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    pub min_subscribers: usize,
    pub provider_query_limit: usize,
    pub dial_timeout_secs: u64,
    pub reconnect_interval_secs: u64,
    pub resubscribe_interval_secs: u64,
    pub gc_interval_secs: u64,
    pub order_ttl_days: u64,
    pub request_snapshot_on_connect: bool,
    pub event_buffer: usize,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            min_subscribers: 2,
            provider_query_limit: 10,
            dial_timeout_secs: 10,
            reconnect_interval_secs: 60,
            resubscribe_interval_secs: 60 * 60,
            gc_interval_secs: 60,
            order_ttl_days: 30,
            request_snapshot_on_connect: true,
            event_buffer: 256,
        }
    }
}

/// HTTP API section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Interface the API binds to. The port always comes from the CLI.
    pub host: IpAddr,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
        }
    }
}

/// Peer-to-peer section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub host: IpAddr,
    /// `<multiaddr>/p2p/<peer id>` entries dialed at startup.
    pub bootstrap_peers: Vec<String>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            bootstrap_peers: Vec::new(),
        }
    }
}
