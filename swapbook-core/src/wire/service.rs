//! Inbound stream dispatch and outbound helpers.
//!
//! Each inbound stream carries exactly one envelope. The envelope's message
//! type selects a handler from a fixed registry; unknown types are logged
//! and the stream is closed without a reply.

use bytes::Bytes;
use kanau::processor::Processor;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use swapbook_sdk::PeerId;
use swapbook_sdk::objects::{Envelope, MessageType, SignedLimitOrder, SignedRemoveOrder};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{Instrument, Span, debug, error, info, warn};

use super::WireError;
use super::codec::{read_envelope, write_envelope};
use crate::events::{NodeEvent, NodeEventSender};
use crate::net::{InboundStream, InboundStreamReceiver, PeerHost};
use crate::orderbook::OrderBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    LimitOrder,
    OrderClose,
    GetOrderBook,
}

/// Sends envelopes to peers and serves the ones they send us.
#[derive(Clone)]
pub struct WireService {
    host: Arc<dyn PeerHost>,
    order_book: OrderBook,
    events: NodeEventSender,
    handlers: Arc<HashMap<MessageType, Handler>>,
}

impl WireService {
    pub fn new(host: Arc<dyn PeerHost>, order_book: OrderBook, events: NodeEventSender) -> Self {
        let handlers = HashMap::from([
            (MessageType::LimitOrder, Handler::LimitOrder),
            (MessageType::OrderClose, Handler::OrderClose),
            (MessageType::GetOrderBook, Handler::GetOrderBook),
        ]);
        Self {
            host,
            order_book,
            events,
            handlers: Arc::new(handlers),
        }
    }

    /// Open a fresh stream, write `envelope`, close our side.
    pub async fn send_message(&self, peer: &PeerId, envelope: &Envelope) -> Result<(), WireError> {
        let mut stream = self.host.open_stream(peer).await?;
        write_envelope(&mut stream, envelope).await?;
        let _ = stream.shutdown().await;
        Ok(())
    }

    /// Open a fresh stream, write `envelope` and wait for a single reply.
    pub async fn send_request(
        &self,
        peer: &PeerId,
        envelope: &Envelope,
    ) -> Result<Envelope, WireError> {
        let mut stream = self.host.open_stream(peer).await?;
        write_envelope(&mut stream, envelope).await?;
        let reply = read_envelope(&mut stream).await;
        let _ = stream.shutdown().await;
        match reply? {
            Some(envelope) => Ok(envelope),
            None => {
                debug!(peer = %peer.short(), "Peer closed stream without replying");
                Err(WireError::PeerDisconnected)
            }
        }
    }

    /// Read one envelope from `inbound` and dispatch it.
    pub async fn handle_stream(&self, inbound: InboundStream) {
        let InboundStream { peer, mut stream } = inbound;

        let envelope = match read_envelope(&mut stream).await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                debug!(peer = %peer.short(), "Disconnected before sending a message");
                return;
            }
            Err(e) => {
                warn!(peer = %peer.short(), error = %e, "Failed to read envelope");
                return;
            }
        };

        let message_type = envelope.message_type();
        let Some(handler) = self.handlers.get(&message_type).copied() else {
            debug!(peer = %peer.short(), %message_type, "No handler for message type");
            return;
        };

        match self.dispatch(handler, &peer, &envelope).await {
            Ok(Some(reply)) => {
                if let Err(e) = write_envelope(&mut stream, &reply).await {
                    error!(peer = %peer.short(), error = %e, "Failed to write reply");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(peer = %peer.short(), %message_type, error = %e, "Handler failed");
            }
        }
        let _ = stream.shutdown().await;
    }

    async fn dispatch(
        &self,
        handler: Handler,
        peer: &PeerId,
        envelope: &Envelope,
    ) -> Result<Option<Envelope>, WireError> {
        match handler {
            Handler::LimitOrder => {
                let bytes = envelope
                    .payload_bytes::<SignedLimitOrder>()
                    .map_err(WireError::Decode)?;
                self.enqueue(NodeEvent::NewOrder {
                    bytes: Bytes::copy_from_slice(bytes),
                    is_mine: false,
                })
                .await?;
                Ok(None)
            }
            Handler::OrderClose => {
                let bytes = envelope
                    .payload_bytes::<SignedRemoveOrder>()
                    .map_err(WireError::Decode)?;
                self.enqueue(NodeEvent::CloseOrder {
                    bytes: Bytes::copy_from_slice(bytes),
                    is_mine: false,
                })
                .await?;
                Ok(None)
            }
            Handler::GetOrderBook => {
                self.send_order_book(peer).await;
                Ok(None)
            }
        }
    }

    /// Dump every stored order to `peer`, one stream per order.
    async fn send_order_book(&self, peer: &PeerId) {
        let orders = self.order_book.open_orders().await;
        debug!(peer = %peer.short(), count = orders.len(), "Sending order book");
        for stored in orders {
            let envelope = match stored.to_envelope() {
                Ok(envelope) => envelope,
                Err(e) => {
                    error!(order_id = %stored.order_id, error = %e, "Failed to wrap order");
                    continue;
                }
            };
            if let Err(e) = self.send_message(peer, &envelope).await {
                warn!(peer = %peer.short(), order_id = %stored.order_id, error = %e, "Failed to send order");
            }
        }
    }

    async fn enqueue(&self, event: NodeEvent) -> Result<(), WireError> {
        self.events
            .send(event)
            .await
            .map_err(|_| WireError::EventLoopClosed)
    }

    /// Serve inbound streams until shutdown. Each stream gets its own task.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut inbound_rx: InboundStreamReceiver,
    ) {
        info!("Wire service started");
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Wire service received shutdown signal");
                        break;
                    }
                }

                Some(inbound) = inbound_rx.recv() => {
                    let service = self.clone();
                    tokio::spawn(
                        async move {
                            let _ = service.process(inbound).await;
                        }
                        .instrument(Span::current()),
                    );
                }

                else => {
                    info!("Inbound stream channel closed");
                    break;
                }
            }
        }
        info!("Wire service shutdown complete");
    }
}

impl Processor<InboundStream> for WireService {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, inbound: InboundStream) -> Result<(), Infallible> {
        self.handle_stream(inbound).await;
        Ok(())
    }
}
