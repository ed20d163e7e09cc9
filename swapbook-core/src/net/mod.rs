//! Capabilities the node needs from the peer-to-peer network.
//!
//! The node never talks to a transport directly. It is handed three narrow
//! traits: a host that dials peers and opens streams, a content router for
//! rendezvous, and a pub/sub bus. [`memory::MemorySwarm`] implements all
//! three in-process.

pub mod memory;

pub use memory::{MemoryHost, MemorySwarm};

use async_trait::async_trait;
use bytes::Bytes;
use swapbook_sdk::{ContentId, IdentityError, PeerId};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// A bidirectional byte stream to a single peer.
pub trait PeerStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> PeerStream for T {}

pub type BoxedStream = Box<dyn PeerStream>;

/// A dialable peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub addrs: Vec<String>,
}

impl PeerInfo {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            addrs: Vec::new(),
        }
    }

    /// Parse `<transport address>/p2p/<peer id>`, as found in bootstrap
    /// lists. The older `/ipfs/` spelling is accepted too.
    pub fn parse(addr: &str) -> Result<Self, PeerAddrError> {
        let (transport, peer) = addr
            .rsplit_once("/p2p/")
            .or_else(|| addr.rsplit_once("/ipfs/"))
            .ok_or_else(|| PeerAddrError::MissingPeerId(addr.to_string()))?;
        let peer_id = PeerId::parse(peer).map_err(|source| PeerAddrError::InvalidPeerId {
            addr: addr.to_string(),
            source,
        })?;
        let mut info = Self::new(peer_id);
        if !transport.is_empty() {
            info.addrs.push(transport.to_string());
        }
        Ok(info)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerAddrError {
    #[error("address {0} does not name a peer")]
    MissingPeerId(String),
    #[error("invalid peer id in {addr}: {source}")]
    InvalidPeerId {
        addr: String,
        #[source]
        source: IdentityError,
    },
}

/// A stream opened by a remote peer on the swap protocol.
pub struct InboundStream {
    pub peer: PeerId,
    pub stream: BoxedStream,
}

pub type InboundStreamSender = mpsc::Sender<InboundStream>;
pub type InboundStreamReceiver = mpsc::Receiver<InboundStream>;

/// A message received on a pub/sub topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipMessage {
    pub from: PeerId,
    pub data: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("peer {0} is unreachable")]
    Unreachable(PeerId),
    #[error("refusing to dial ourselves")]
    DialSelf,
    #[error("network is shut down")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait PeerHost: Send + Sync {
    fn local_peer(&self) -> &PeerInfo;

    /// Establish a connection. A no-op when one is already open.
    async fn connect(&self, peer: &PeerInfo) -> Result<(), NetError>;

    /// Number of live connections to `peer`.
    async fn connection_count(&self, peer: &PeerId) -> usize;

    /// Open a new stream to `peer` on the swap protocol.
    async fn open_stream(&self, peer: &PeerId) -> Result<BoxedStream, NetError>;
}

#[async_trait]
pub trait ContentRouting: Send + Sync {
    /// Advertise ourselves as a provider of `key`.
    async fn provide(&self, key: &ContentId) -> Result<(), NetError>;

    async fn find_providers(&self, key: &ContentId, limit: usize)
    -> Result<Vec<PeerInfo>, NetError>;
}

#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish(&self, topic: &str, data: Bytes) -> Result<(), NetError>;

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<GossipMessage>, NetError>;
}
