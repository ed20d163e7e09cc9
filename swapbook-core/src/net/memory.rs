//! In-process network used by tests and devnet mode.
//!
//! Streams are `tokio::io::duplex` pairs, connections are reference counts
//! per unordered peer pair, and pub/sub fans a message out to every other
//! subscriber of the topic.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use swapbook_sdk::{ContentId, PeerId};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use super::{
    BoxedStream, ContentRouting, GossipMessage, InboundStream, InboundStreamReceiver, NetError,
    PeerHost, PeerInfo, PubSub,
};

const STREAM_BUFFER: usize = 64 * 1024;
const QUEUE_BUFFER: usize = 256;

type Link = (PeerId, PeerId);

fn link(a: &PeerId, b: &PeerId) -> Link {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

#[derive(Default)]
struct SwarmState {
    nodes: HashMap<PeerId, mpsc::Sender<InboundStream>>,
    connections: HashMap<Link, usize>,
    providers: HashMap<ContentId, Vec<PeerInfo>>,
    subscriptions: HashMap<String, Vec<(PeerId, mpsc::Sender<GossipMessage>)>>,
}

impl SwarmState {
    fn ensure_connected(&mut self, a: &PeerId, b: &PeerId) {
        let count = self.connections.entry(link(a, b)).or_insert(0);
        *count = (*count).max(1);
    }
}

/// A shared in-memory network. Cloning yields another handle to the same one.
#[derive(Clone, Default)]
pub struct MemorySwarm {
    state: Arc<Mutex<SwarmState>>,
}

impl MemorySwarm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node. Streams other peers open to it arrive on the receiver.
    pub async fn join(&self, local: PeerInfo) -> (MemoryHost, InboundStreamReceiver) {
        let (tx, rx) = mpsc::channel(QUEUE_BUFFER);
        self.state
            .lock()
            .await
            .nodes
            .insert(local.peer_id.clone(), tx);
        debug!(peer = %local.peer_id.short(), "Node joined memory swarm");
        let host = MemoryHost {
            swarm: self.clone(),
            local,
        };
        (host, rx)
    }

    /// Detach a node and forget everything it advertised.
    pub async fn leave(&self, peer: &PeerId) {
        let mut state = self.state.lock().await;
        state.nodes.remove(peer);
        state.connections.retain(|(a, b), _| a != peer && b != peer);
        for providers in state.providers.values_mut() {
            providers.retain(|p| &p.peer_id != peer);
        }
        for subscribers in state.subscriptions.values_mut() {
            subscribers.retain(|(id, _)| id != peer);
        }
        debug!(peer = %peer.short(), "Node left memory swarm");
    }

    /// Close every connection between `a` and `b`.
    pub async fn disconnect(&self, a: &PeerId, b: &PeerId) {
        self.state.lock().await.connections.remove(&link(a, b));
    }

    pub async fn is_connected(&self, a: &PeerId, b: &PeerId) -> bool {
        self.state
            .lock()
            .await
            .connections
            .get(&link(a, b))
            .is_some_and(|count| *count > 0)
    }
}

/// One node's view of a [`MemorySwarm`].
#[derive(Clone)]
pub struct MemoryHost {
    swarm: MemorySwarm,
    local: PeerInfo,
}

impl MemoryHost {
    pub fn swarm(&self) -> &MemorySwarm {
        &self.swarm
    }

    fn local_id(&self) -> &PeerId {
        &self.local.peer_id
    }
}

#[async_trait]
impl PeerHost for MemoryHost {
    fn local_peer(&self) -> &PeerInfo {
        &self.local
    }

    async fn connect(&self, peer: &PeerInfo) -> Result<(), NetError> {
        if &peer.peer_id == self.local_id() {
            return Err(NetError::DialSelf);
        }
        let mut state = self.swarm.state.lock().await;
        if !state.nodes.contains_key(&peer.peer_id) {
            return Err(NetError::Unreachable(peer.peer_id.clone()));
        }
        state.ensure_connected(self.local_id(), &peer.peer_id);
        Ok(())
    }

    async fn connection_count(&self, peer: &PeerId) -> usize {
        self.swarm
            .state
            .lock()
            .await
            .connections
            .get(&link(self.local_id(), peer))
            .copied()
            .unwrap_or(0)
    }

    async fn open_stream(&self, peer: &PeerId) -> Result<BoxedStream, NetError> {
        if peer == self.local_id() {
            return Err(NetError::DialSelf);
        }
        let inbound = {
            let mut state = self.swarm.state.lock().await;
            let inbound = state
                .nodes
                .get(peer)
                .cloned()
                .ok_or_else(|| NetError::Unreachable(peer.clone()))?;
            state.ensure_connected(self.local_id(), peer);
            inbound
        };

        let (local_half, remote_half) = tokio::io::duplex(STREAM_BUFFER);
        inbound
            .send(InboundStream {
                peer: self.local_id().clone(),
                stream: Box::new(remote_half),
            })
            .await
            .map_err(|_| NetError::Unreachable(peer.clone()))?;
        Ok(Box::new(local_half))
    }
}

#[async_trait]
impl ContentRouting for MemoryHost {
    async fn provide(&self, key: &ContentId) -> Result<(), NetError> {
        let mut state = self.swarm.state.lock().await;
        let providers = state.providers.entry(key.clone()).or_default();
        if !providers.iter().any(|p| &p.peer_id == self.local_id()) {
            providers.push(self.local.clone());
        }
        Ok(())
    }

    async fn find_providers(
        &self,
        key: &ContentId,
        limit: usize,
    ) -> Result<Vec<PeerInfo>, NetError> {
        let state = self.swarm.state.lock().await;
        Ok(state
            .providers
            .get(key)
            .map(|providers| {
                providers
                    .iter()
                    .filter(|p| state.nodes.contains_key(&p.peer_id))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl PubSub for MemoryHost {
    async fn publish(&self, topic: &str, data: Bytes) -> Result<(), NetError> {
        let subscribers: Vec<mpsc::Sender<GossipMessage>> = {
            let state = self.swarm.state.lock().await;
            state
                .subscriptions
                .get(topic)
                .map(|subs| {
                    subs.iter()
                        .filter(|(id, _)| id != self.local_id())
                        .map(|(_, tx)| tx.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        for tx in subscribers {
            let message = GossipMessage {
                from: self.local_id().clone(),
                data: data.clone(),
            };
            // A dropped subscription only means that node stopped listening.
            let _ = tx.send(message).await;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<GossipMessage>, NetError> {
        let (tx, rx) = mpsc::channel(QUEUE_BUFFER);
        self.swarm
            .state
            .lock()
            .await
            .subscriptions
            .entry(topic.to_string())
            .or_default()
            .push((self.local_id().clone(), tx));
        Ok(rx)
    }
}
