//! Local in-memory network for running a node without real peers.
//!
//! The server's own node and `--devnet-peers` extra nodes share one
//! [`MemorySwarm`], so orders submitted through the API gossip to the extra
//! peers and snapshots flow back exactly as they would between hosts.

use std::net::SocketAddr;
use std::sync::Arc;
use swapbook_core::config::NodeConfig;
use swapbook_core::net::{MemorySwarm, PeerInfo};
use swapbook_core::{NodeError, NodeHandle, NodeParts, SwapNode};
use swapbook_sdk::{Keypair, SelfCertifying, SignatureError, Signer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DevnetError {
    #[error("failed to generate peer key: {0}")]
    Key(#[from] SignatureError),
    #[error("failed to start node: {0}")]
    Node(#[from] NodeError),
}

/// Attach `keypair` to `swarm` and start a node on it.
pub async fn start_node(
    swarm: &MemorySwarm,
    keypair: Keypair,
    listen: Option<SocketAddr>,
    config: NodeConfig,
) -> Result<NodeHandle, DevnetError> {
    let mut info = PeerInfo::new(keypair.peer_id());
    if let Some(addr) = listen {
        info.addrs.push(multiaddr(addr));
    }
    let (host, inbound) = swarm.join(info).await;
    let host = Arc::new(host);
    let node = SwapNode::new(NodeParts {
        host: host.clone(),
        routing: host.clone(),
        pubsub: host,
        inbound,
        signer: Arc::new(keypair),
        keys: Arc::new(SelfCertifying),
        config,
    })
    .start()
    .await?;
    Ok(node)
}

/// Start `count` throwaway peers with fresh keys.
pub async fn spawn_peers(
    swarm: &MemorySwarm,
    count: usize,
    config: &NodeConfig,
) -> Result<Vec<NodeHandle>, DevnetError> {
    let mut peers = Vec::with_capacity(count);
    for _ in 0..count {
        let node = start_node(swarm, Keypair::generate()?, None, config.clone()).await?;
        tracing::info!(peer = %node.local_peer_id(), "Devnet peer started");
        peers.push(node);
    }
    Ok(peers)
}

fn multiaddr(addr: SocketAddr) -> String {
    let proto = if addr.is_ipv4() { "ip4" } else { "ip6" };
    format!("/{proto}/{}/tcp/{}", addr.ip(), addr.port())
}
