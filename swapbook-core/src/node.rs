//! Assembly of a running node.
//!
//! [`SwapNode`] owns the wiring; [`NodeHandle`] is what the outside world
//! (the HTTP API, tests) uses once the tasks are spawned.

use std::sync::Arc;
use swapbook_sdk::objects::{Envelope, ObjectError, SignedRemoveOrder, WireObject};
use swapbook_sdk::{KeyResolver, OrderId, PeerId, SignatureError, Signer};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, info, info_span};

use crate::config::NodeConfig;
use crate::events::{NodeEvent, NodeEventSender, node_event_channel};
use crate::net::{ContentRouting, InboundStreamReceiver, NetError, PeerHost, PubSub};
use crate::orderbook::{OrderBook, OrderBookError, StoredOrder, SubmitError};
use crate::processors::{
    ExpirySweeper, GossipListener, NodeEventLoop, PeerSet, PeerSetWatch, TopologyManager,
};
use crate::publisher::{BroadcastPublisher, PublishError};
use crate::wire::{WireError, WireService};

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Lookup(#[from] OrderBookError),
    #[error("order {0} was not created by this node")]
    NotMine(OrderId),
    #[error("failed to sign withdrawal: {0}")]
    Signing(#[from] SignatureError),
    #[error("failed to encode withdrawal: {0}")]
    Encode(#[from] ObjectError),
    #[error("failed to subscribe to {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: NetError,
    },
    #[error("node event loop is gone")]
    EventLoopClosed,
}

/// Everything a node needs from the outside.
pub struct NodeParts {
    pub host: Arc<dyn PeerHost>,
    pub routing: Arc<dyn ContentRouting>,
    pub pubsub: Arc<dyn PubSub>,
    pub inbound: InboundStreamReceiver,
    pub signer: Arc<dyn Signer>,
    pub keys: Arc<dyn KeyResolver>,
    pub config: NodeConfig,
}

pub struct SwapNode {
    parts: NodeParts,
    span: Span,
}

impl SwapNode {
    pub fn new(parts: NodeParts) -> Self {
        let peer_id = parts.signer.peer_id();
        let span = info_span!("node", peer = %peer_id.short());
        Self { parts, span }
    }

    /// Subscribe to the order book topic and spawn every processor.
    pub async fn start(self) -> Result<NodeHandle, NodeError> {
        let SwapNode { parts, span } = self;
        let NodeParts {
            host,
            routing,
            pubsub,
            inbound,
            signer,
            keys,
            config,
        } = parts;

        let subscription = pubsub
            .subscribe(&config.topic)
            .await
            .map_err(|source| NodeError::Subscribe {
                topic: config.topic.clone(),
                source,
            })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = node_event_channel(config.event_buffer);
        let order_book = OrderBook::with_ttl(keys, config.order_ttl);
        let (event_loop, peers) = NodeEventLoop::new(order_book.clone());
        let wire = WireService::new(host.clone(), order_book.clone(), events_tx.clone());
        let topology = TopologyManager::new(
            host,
            routing,
            wire.clone(),
            events_tx.clone(),
            peers.clone(),
            config.clone(),
        );
        let gossip = GossipListener::new(events_tx.clone());
        let sweeper = ExpirySweeper::new(order_book.clone(), config.gc_interval);
        let publisher = BroadcastPublisher::new(pubsub, config.topic.clone());

        let tasks = vec![
            tokio::spawn(
                event_loop
                    .run(shutdown_rx.clone(), events_rx)
                    .instrument(span.clone()),
            ),
            tokio::spawn(
                wire.clone()
                    .run(shutdown_rx.clone(), inbound)
                    .instrument(span.clone()),
            ),
            tokio::spawn(
                gossip
                    .run(shutdown_rx.clone(), subscription)
                    .instrument(span.clone()),
            ),
            tokio::spawn(sweeper.run(shutdown_rx.clone()).instrument(span.clone())),
            tokio::spawn(topology.run(shutdown_rx).instrument(span.clone())),
        ];

        let peer_id = signer.peer_id();
        span.in_scope(|| info!(peer = %peer_id, topic = %config.topic, "Node started"));

        Ok(NodeHandle {
            inner: Arc::new(NodeInner {
                peer_id,
                signer,
                order_book,
                events: events_tx,
                publisher,
                wire,
                peers,
                shutdown_tx,
                tasks: Mutex::new(tasks),
                span,
            }),
        })
    }
}

struct NodeInner {
    peer_id: PeerId,
    signer: Arc<dyn Signer>,
    order_book: OrderBook,
    events: NodeEventSender,
    publisher: BroadcastPublisher,
    wire: WireService,
    peers: PeerSetWatch,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    span: Span,
}

/// Cloneable handle to a running node.
#[derive(Clone)]
pub struct NodeHandle {
    inner: Arc<NodeInner>,
}

impl NodeHandle {
    pub fn local_peer_id(&self) -> &PeerId {
        &self.inner.peer_id
    }

    pub fn order_book(&self) -> &OrderBook {
        &self.inner.order_book
    }

    pub fn wire(&self) -> &WireService {
        &self.inner.wire
    }

    /// Snapshot of the subscribed peers.
    pub fn peers(&self) -> PeerSet {
        self.inner.peers.borrow().clone()
    }

    pub async fn open_orders(&self) -> Vec<StoredOrder> {
        self.inner.order_book.open_orders().await
    }

    pub async fn lookup(&self, order_id: &OrderId) -> Result<(StoredOrder, bool), OrderBookError> {
        self.inner.order_book.lookup(order_id).await
    }

    /// Sign a new order, add it to our book and broadcast it.
    pub async fn publish_limit_order(
        &self,
        quantity: u64,
        price: u64,
        buy_btc: bool,
    ) -> Result<OrderId, NodeError> {
        let inner = &self.inner;
        let local = inner.order_book.submit_local(
            quantity,
            price,
            buy_btc,
            inner.signer.as_ref(),
            &inner.peer_id,
        )?;
        self.enqueue(local.event).await?;
        inner
            .publisher
            .publish(&local.envelope)
            .instrument(inner.span.clone())
            .await?;
        Ok(local.order_id)
    }

    /// Withdraw one of our own orders everywhere.
    pub async fn withdraw_order(&self, order_id: &OrderId) -> Result<(), NodeError> {
        let inner = &self.inner;
        let (_, mine) = inner.order_book.lookup(order_id).await?;
        if !mine {
            return Err(NodeError::NotMine(order_id.clone()));
        }

        let request = SignedRemoveOrder::sign(order_id, inner.signer.as_ref())?;
        self.enqueue(NodeEvent::CloseOrder {
            bytes: request.to_bytes()?.into(),
            is_mine: true,
        })
        .await?;
        inner
            .publisher
            .publish(&Envelope::order_close(&request)?)
            .instrument(inner.span.clone())
            .await?;
        Ok(())
    }

    /// Ask `peer` to stream its whole order book to us.
    pub async fn request_order_book(&self, peer: &PeerId) -> Result<(), WireError> {
        self.inner
            .wire
            .send_message(peer, &Envelope::get_order_book())
            .await
    }

    /// Stop every processor and wait for them to finish.
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(true);
        let tasks = std::mem::take(&mut *self.inner.tasks.lock().await);
        for task in tasks {
            let _ = task.await;
        }
        self.inner
            .span
            .in_scope(|| info!("Node shutdown complete"));
    }

    async fn enqueue(&self, event: NodeEvent) -> Result<(), NodeError> {
        self.inner
            .events
            .send(event)
            .await
            .map_err(|_| NodeError::EventLoopClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{MemorySwarm, PeerInfo};
    use std::time::Duration;
    use swapbook_sdk::{Keypair, SelfCertifying};

    async fn spawn_node(swarm: &MemorySwarm, config: NodeConfig) -> NodeHandle {
        let keypair = Keypair::generate().unwrap();
        let (host, inbound) = swarm.join(PeerInfo::new(keypair.peer_id())).await;
        let host = Arc::new(host);
        SwapNode::new(NodeParts {
            host: host.clone(),
            routing: host.clone(),
            pubsub: host,
            inbound,
            signer: Arc::new(keypair),
            keys: Arc::new(SelfCertifying),
            config,
        })
        .start()
        .await
        .unwrap()
    }

    /// Poll `check` until it holds or a few seconds pass.
    async fn eventually<F, Fut>(mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..500 {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_order_propagates_and_empty_peer_sends_nothing() {
        let swarm = MemorySwarm::new();
        let a = spawn_node(&swarm, NodeConfig::default()).await;
        let b = spawn_node(&swarm, NodeConfig::default()).await;

        let order_id = a.publish_limit_order(10, 5000, true).await.unwrap();

        assert!(eventually(|| async { b.order_book().len().await == 1 }).await);
        let (stored, mine) = b.lookup(&order_id).await.unwrap();
        assert!(!mine);
        assert_eq!(stored.order.peer_id, a.local_peer_id().to_string());
        assert_eq!(stored.order.quantity, 10);
        assert_eq!(stored.order.price, 5000);
        assert!(stored.order.buy_btc);
        assert!(eventually(|| async { a.lookup(&order_id).await.is_ok_and(|(_, mine)| mine) }).await);

        // C joins after the gossip went out and does not ask for snapshots.
        let c = spawn_node(
            &swarm,
            NodeConfig {
                request_snapshot_on_connect: false,
                ..NodeConfig::default()
            },
        )
        .await;
        assert!(c.order_book().is_empty().await);

        let reply = b
            .wire()
            .send_request(c.local_peer_id(), &Envelope::get_order_book())
            .await;
        assert!(matches!(reply, Err(WireError::PeerDisconnected)));
        assert_eq!(b.order_book().len().await, 1);

        for node in [a, b, c] {
            node.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_snapshot_on_connect_fills_late_joiner() {
        let swarm = MemorySwarm::new();
        let a = spawn_node(&swarm, NodeConfig::default()).await;
        let order_id = a.publish_limit_order(1, 2, false).await.unwrap();
        assert!(eventually(|| async { a.order_book().len().await == 1 }).await);

        let late = spawn_node(&swarm, NodeConfig::default()).await;
        assert!(eventually(|| async { late.lookup(&order_id).await.is_ok() }).await);
        assert!(eventually(|| async { late.peers().contains(a.local_peer_id()) }).await);

        a.shutdown().await;
        late.shutdown().await;
    }

    #[tokio::test]
    async fn test_withdrawal_propagates() {
        let swarm = MemorySwarm::new();
        let a = spawn_node(&swarm, NodeConfig::default()).await;
        let b = spawn_node(&swarm, NodeConfig::default()).await;

        let order_id = a.publish_limit_order(10, 5000, true).await.unwrap();
        assert!(eventually(|| async { b.lookup(&order_id).await.is_ok() }).await);
        assert!(eventually(|| async { a.lookup(&order_id).await.is_ok() }).await);

        assert!(matches!(
            b.withdraw_order(&order_id).await,
            Err(NodeError::NotMine(_))
        ));

        a.withdraw_order(&order_id).await.unwrap();
        assert!(eventually(|| async { b.order_book().is_empty().await }).await);
        assert!(eventually(|| async { a.order_book().is_empty().await }).await);
        assert!(matches!(
            a.withdraw_order(&order_id).await,
            Err(NodeError::Lookup(OrderBookError::NotFound(_)))
        ));

        a.shutdown().await;
        b.shutdown().await;
    }
}
