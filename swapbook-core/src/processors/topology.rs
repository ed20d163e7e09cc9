//! TopologyManager processor.
//!
//! Keeps the node connected to enough order book participants:
//! - Dials the configured bootstrap peers once at startup
//! - Advertises this node under the rendezvous key, at start and periodically
//! - Discovers providers of the key and dials the ones we are not subscribed to
//! - On every maintenance tick, reports subscribed peers that have no live
//!   connection left and rediscovers when too few remain
//!
//! The manager never edits the peer set itself. It only enqueues
//! `AddPeer` / `RemovePeer` events for the event loop.

use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use swapbook_sdk::objects::Envelope;
use swapbook_sdk::{ContentId, PeerId};
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::event_loop::PeerSetWatch;
use crate::config::NodeConfig;
use crate::events::{NodeEvent, NodeEventSender};
use crate::net::{ContentRouting, PeerHost, PeerInfo};
use crate::wire::WireService;

/// Where a peer stands from this node's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Unknown,
    Connecting,
    Subscribed,
    /// Reported lost on the most recent maintenance tick.
    Lost,
}

/// What a maintenance tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Peers reported lost this tick.
    pub removed: Vec<PeerId>,
    /// Subscribed peers left once the lost ones are gone.
    pub remaining: usize,
    /// Peers newly subscribed by discovery, if discovery ran.
    pub discovered: Option<usize>,
}

pub struct TopologyManager {
    host: Arc<dyn PeerHost>,
    routing: Arc<dyn ContentRouting>,
    wire: WireService,
    events: NodeEventSender,
    peers: PeerSetWatch,
    config: NodeConfig,
    rendezvous_key: ContentId,
    states: Mutex<HashMap<PeerId, PeerState>>,
}

impl TopologyManager {
    pub fn new(
        host: Arc<dyn PeerHost>,
        routing: Arc<dyn ContentRouting>,
        wire: WireService,
        events: NodeEventSender,
        peers: PeerSetWatch,
        config: NodeConfig,
    ) -> Self {
        let rendezvous_key = config.rendezvous_key();
        Self {
            host,
            routing,
            wire,
            events,
            peers,
            config,
            rendezvous_key,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub async fn peer_state(&self, peer: &PeerId) -> PeerState {
        if self.peers.borrow().contains(peer) {
            return PeerState::Subscribed;
        }
        self.states
            .lock()
            .await
            .get(peer)
            .copied()
            .unwrap_or(PeerState::Unknown)
    }

    /// Connect to the configured bootstrap peers.
    ///
    /// Bootstrap connections only join us to the network; subscriptions
    /// still come from discovery. Returns how many peers connected.
    pub async fn bootstrap(&self) -> usize {
        let local = &self.host.local_peer().peer_id;
        let targets: Vec<&PeerInfo> = self
            .config
            .bootstrap_peers
            .iter()
            .filter(|peer| &peer.peer_id != local)
            .collect();
        if targets.is_empty() {
            return 0;
        }

        let dialed = join_all(targets.iter().map(|peer| async move {
            match tokio::time::timeout(self.config.dial_timeout, self.host.connect(peer)).await {
                Ok(Ok(())) => {
                    debug!(peer = %peer.peer_id.short(), "Connected to bootstrap peer");
                    true
                }
                Ok(Err(e)) => {
                    warn!(peer = %peer.peer_id.short(), error = %e, "Failed to connect to bootstrap peer");
                    false
                }
                Err(_) => {
                    warn!(peer = %peer.peer_id.short(), timeout = ?self.config.dial_timeout, "Bootstrap dial timed out");
                    false
                }
            }
        }))
        .await;
        let connected = dialed.into_iter().filter(|ok| *ok).count();
        info!(connected, configured = targets.len(), "Bootstrap finished");
        connected
    }

    /// Advertise this node as an order book participant.
    pub async fn announce_presence(&self) {
        match self.routing.provide(&self.rendezvous_key).await {
            Ok(()) => debug!(key = %self.rendezvous_key, "Announced presence"),
            Err(e) => warn!(key = %self.rendezvous_key, error = %e, "Failed to announce presence"),
        }
    }

    /// Query providers and dial every one we are not yet subscribed to.
    ///
    /// Returns how many peers were newly subscribed.
    pub async fn discovery_round(&self) -> usize {
        let subscribed: HashSet<PeerId> = self.peers.borrow().iter().cloned().collect();
        self.discover(&subscribed).await
    }

    async fn discover(&self, subscribed: &HashSet<PeerId>) -> usize {
        let providers = match self
            .routing
            .find_providers(&self.rendezvous_key, self.config.provider_query_limit)
            .await
        {
            Ok(providers) => providers,
            Err(e) => {
                warn!(error = %e, "Provider query failed");
                return 0;
            }
        };

        let local = &self.host.local_peer().peer_id;
        let candidates: Vec<PeerInfo> = providers
            .into_iter()
            .filter(|p| &p.peer_id != local && !subscribed.contains(&p.peer_id))
            .collect();
        if candidates.is_empty() {
            debug!("No new providers found");
            return 0;
        }

        debug!(candidates = candidates.len(), "Dialing providers");
        let dialed = join_all(candidates.into_iter().map(|candidate| self.dial(candidate))).await;
        let added = dialed.into_iter().filter(|ok| *ok).count();
        if added > 0 {
            info!(added, "Discovery subscribed new peers");
        }
        added
    }

    async fn dial(&self, candidate: PeerInfo) -> bool {
        let peer = candidate.peer_id.clone();
        {
            let mut states = self.states.lock().await;
            if states.get(&peer) == Some(&PeerState::Connecting) {
                return false;
            }
            states.insert(peer.clone(), PeerState::Connecting);
        }

        let connected =
            tokio::time::timeout(self.config.dial_timeout, self.host.connect(&candidate)).await;
        let subscribed = match connected {
            Ok(Ok(())) => {
                debug!(peer = %peer.short(), "Connected to order book peer");
                self.events
                    .send(NodeEvent::AddPeer(peer.clone()))
                    .await
                    .is_ok()
            }
            Ok(Err(e)) => {
                debug!(peer = %peer.short(), error = %e, "Dial failed");
                false
            }
            Err(_) => {
                debug!(peer = %peer.short(), timeout = ?self.config.dial_timeout, "Dial timed out");
                false
            }
        };

        {
            let mut states = self.states.lock().await;
            if subscribed {
                states.insert(peer.clone(), PeerState::Subscribed);
            } else {
                states.remove(&peer);
            }
        }

        if subscribed && self.config.request_snapshot_on_connect {
            if let Err(e) = self
                .wire
                .send_message(&peer, &Envelope::get_order_book())
                .await
            {
                debug!(peer = %peer.short(), error = %e, "Order book request failed");
            }
        }
        subscribed
    }

    /// Drop dead subscriptions and rediscover when below the minimum.
    pub async fn maintenance_tick(&self) -> MaintenanceReport {
        let subscribed: Vec<PeerId> = self.peers.borrow().iter().cloned().collect();
        self.states
            .lock()
            .await
            .retain(|_, state| *state != PeerState::Lost);

        let mut removed = Vec::new();
        for peer in &subscribed {
            if self.host.connection_count(peer).await > 0 {
                continue;
            }
            if self.events.send(NodeEvent::RemovePeer(peer.clone())).await.is_err() {
                warn!("Node event channel closed during maintenance");
                break;
            }
            removed.push(peer.clone());
        }
        if !removed.is_empty() {
            let mut states = self.states.lock().await;
            for peer in &removed {
                states.insert(peer.clone(), PeerState::Lost);
            }
        }

        let live: HashSet<PeerId> = subscribed
            .into_iter()
            .filter(|p| !removed.contains(p))
            .collect();
        let remaining = live.len();
        let discovered = if remaining < self.config.min_subscribers {
            debug!(remaining, minimum = self.config.min_subscribers, "Too few subscribers, discovering");
            Some(self.discover(&live).await)
        } else {
            None
        };

        MaintenanceReport {
            removed,
            remaining,
            discovered,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let startup = async {
            self.bootstrap().await;
            self.announce_presence().await;
            self.discovery_round().await;
        };
        tokio::select! {
            biased;

            _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => {
                info!("Topology manager stopped during startup");
                return;
            }

            _ = startup => {}
        }

        let start = Instant::now();
        let mut reconnect = interval_at(
            start + self.config.reconnect_interval,
            self.config.reconnect_interval,
        );
        reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut resubscribe = interval_at(
            start + self.config.resubscribe_interval,
            self.config.resubscribe_interval,
        );
        resubscribe.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Topology manager started");
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Topology manager received shutdown signal");
                        break;
                    }
                }

                _ = reconnect.tick() => {
                    let report = self.maintenance_tick().await;
                    debug!(
                        removed = report.removed.len(),
                        remaining = report.remaining,
                        discovered = ?report.discovered,
                        "Maintenance tick"
                    );
                }

                _ = resubscribe.tick() => {
                    self.announce_presence().await;
                }
            }
        }
        info!("Topology manager shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NodeEventReceiver, node_event_channel};
    use crate::net::{BoxedStream, InboundStreamReceiver, MemoryHost, MemorySwarm, NetError};
    use async_trait::async_trait;
    use std::time::Duration;
    use crate::orderbook::OrderBook;
    use crate::processors::event_loop::PeerSet;
    use swapbook_sdk::{Keypair, SelfCertifying, Signer};

    struct Harness {
        manager: TopologyManager,
        events: NodeEventReceiver,
        peers_tx: watch::Sender<PeerSet>,
        _inbound: InboundStreamReceiver,
    }

    async fn join(swarm: &MemorySwarm) -> (MemoryHost, InboundStreamReceiver) {
        let id = Keypair::generate().unwrap().peer_id();
        swarm.join(PeerInfo::new(id)).await
    }

    fn quiet_config() -> NodeConfig {
        NodeConfig {
            request_snapshot_on_connect: false,
            ..NodeConfig::default()
        }
    }

    fn harness(host: MemoryHost, inbound: InboundStreamReceiver, initial: PeerSet) -> Harness {
        harness_with(host, inbound, initial, quiet_config())
    }

    fn harness_with(
        host: MemoryHost,
        inbound: InboundStreamReceiver,
        initial: PeerSet,
        config: NodeConfig,
    ) -> Harness {
        let (tx, events) = node_event_channel(16);
        let (peers_tx, peers_rx) = watch::channel(initial);
        let host = Arc::new(host);
        let wire = WireService::new(
            host.clone(),
            OrderBook::new(Arc::new(SelfCertifying)),
            tx.clone(),
        );
        let manager = TopologyManager::new(host.clone(), host, wire, tx, peers_rx, config);
        Harness {
            manager,
            events,
            peers_tx,
            _inbound: inbound,
        }
    }

    #[tokio::test]
    async fn test_discovery_dials_unsubscribed_providers() {
        let swarm = MemorySwarm::new();
        let (local, local_rx) = join(&swarm).await;
        let (other, _other_rx) = join(&swarm).await;
        let other_id = other.local_peer().peer_id.clone();
        let mut h = harness(local, local_rx, PeerSet::default());

        other.provide(&NodeConfig::default().rendezvous_key()).await.unwrap();
        h.manager.announce_presence().await;

        assert_eq!(h.manager.discovery_round().await, 1);
        assert_eq!(h.events.recv().await.unwrap(), NodeEvent::AddPeer(other_id.clone()));
        assert!(h.events.try_recv().is_err());

        h.peers_tx.send(PeerSet::from_iter([other_id.clone()])).unwrap();
        assert_eq!(h.manager.peer_state(&other_id).await, PeerState::Subscribed);
        assert_eq!(h.manager.discovery_round().await, 0);
    }

    #[tokio::test]
    async fn test_lost_peer_is_removed_and_rediscovered() {
        let swarm = MemorySwarm::new();
        let (local, local_rx) = join(&swarm).await;
        let (other, _other_rx) = join(&swarm).await;
        let local_id = local.local_peer().peer_id.clone();
        let other_id = other.local_peer().peer_id.clone();
        other.provide(&NodeConfig::default().rendezvous_key()).await.unwrap();
        local.connect(other.local_peer()).await.unwrap();

        let mut h = harness(local, local_rx, PeerSet::from_iter([other_id.clone()]));

        // Still connected: nothing to do, and one subscriber is below the
        // minimum of two, but the only provider is already subscribed.
        let report = h.manager.maintenance_tick().await;
        assert!(report.removed.is_empty());
        assert_eq!(report.remaining, 1);
        assert_eq!(report.discovered, Some(0));
        assert!(h.events.try_recv().is_err());

        swarm.disconnect(&local_id, &other_id).await;
        let report = h.manager.maintenance_tick().await;
        assert_eq!(report.removed, vec![other_id.clone()]);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.discovered, Some(1));
        assert_eq!(h.events.recv().await.unwrap(), NodeEvent::RemovePeer(other_id.clone()));
        assert_eq!(h.events.recv().await.unwrap(), NodeEvent::AddPeer(other_id.clone()));
        assert!(swarm.is_connected(&local_id, &other_id).await);
    }

    #[tokio::test]
    async fn test_lost_state_is_cleared_on_next_tick() {
        let swarm = MemorySwarm::new();
        let (local, local_rx) = join(&swarm).await;
        let (other, _other_rx) = join(&swarm).await;
        let other_id = other.local_peer().peer_id.clone();

        let mut h = harness(local, local_rx, PeerSet::from_iter([other_id.clone()]));
        let report = h.manager.maintenance_tick().await;
        assert_eq!(report.removed, vec![other_id.clone()]);
        assert_eq!(report.discovered, Some(0));
        assert_eq!(h.events.recv().await.unwrap(), NodeEvent::RemovePeer(other_id.clone()));

        h.peers_tx.send(PeerSet::default()).unwrap();
        assert_eq!(h.manager.peer_state(&other_id).await, PeerState::Lost);

        let report = h.manager.maintenance_tick().await;
        assert!(report.removed.is_empty());
        assert_eq!(h.manager.peer_state(&other_id).await, PeerState::Unknown);
        assert!(h.manager.states.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_connects_to_configured_peers() {
        let swarm = MemorySwarm::new();
        let (local, local_rx) = join(&swarm).await;
        let (other, _other_rx) = join(&swarm).await;
        let local_id = local.local_peer().peer_id.clone();
        let other_id = other.local_peer().peer_id.clone();
        let absent = Keypair::generate().unwrap().peer_id();

        let config = NodeConfig {
            bootstrap_peers: vec![
                PeerInfo::new(other_id.clone()),
                PeerInfo::new(absent),
                PeerInfo::new(local_id.clone()),
            ],
            ..quiet_config()
        };
        let mut h = harness_with(local, local_rx, PeerSet::default(), config);

        assert_eq!(h.manager.bootstrap().await, 1);
        assert!(swarm.is_connected(&local_id, &other_id).await);
        // Bootstrap peers are not subscribers until discovery finds them.
        assert!(h.events.try_recv().is_err());
    }

    /// A host whose dials never complete.
    struct StallingHost {
        local: PeerInfo,
    }

    #[async_trait]
    impl PeerHost for StallingHost {
        fn local_peer(&self) -> &PeerInfo {
            &self.local
        }

        async fn connect(&self, _peer: &PeerInfo) -> Result<(), NetError> {
            std::future::pending().await
        }

        async fn connection_count(&self, _peer: &PeerId) -> usize {
            0
        }

        async fn open_stream(&self, peer: &PeerId) -> Result<BoxedStream, NetError> {
            Err(NetError::Unreachable(peer.clone()))
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_startup_dials() {
        let swarm = MemorySwarm::new();
        let (routing, _inbound) = join(&swarm).await;
        let host: Arc<dyn PeerHost> = Arc::new(StallingHost {
            local: routing.local_peer().clone(),
        });
        let config = NodeConfig {
            dial_timeout: Duration::from_secs(3600),
            bootstrap_peers: vec![PeerInfo::new(Keypair::generate().unwrap().peer_id())],
            ..quiet_config()
        };
        let (tx, _events) = node_event_channel(16);
        let (_peers_tx, peers_rx) = watch::channel(PeerSet::default());
        let wire = WireService::new(
            host.clone(),
            OrderBook::new(Arc::new(SelfCertifying)),
            tx.clone(),
        );
        let manager = TopologyManager::new(host, Arc::new(routing), wire, tx, peers_rx, config);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(manager.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
