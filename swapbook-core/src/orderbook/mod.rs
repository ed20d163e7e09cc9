//! The replicated order book.
//!
//! Every order is keyed by the content id of its unsigned serialization, so
//! the same order received over gossip, a snapshot dump and the local API
//! lands in the same slot. Orders created by this node are additionally
//! tracked in a `mine` partition, which is always a subset of the book.
//!
//! Mutation is expected to go through the node event loop; readers take the
//! shared lock and never observe a half-applied change.

mod error;

pub use error::{OrderBookError, OrderRejection, SubmitError};

use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use swapbook_sdk::objects::{Envelope, LimitOrder, ObjectError, SignedLimitOrder, SignedRemoveOrder};
use swapbook_sdk::objects::WireObject;
use swapbook_sdk::{ContentId, KeyResolver, OrderId, PeerId, Signer};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_ORDER_TTL;
use crate::events::NodeEvent;
use crate::utils::clock::{expiry_after, unix_now};

// ---------------------------------------------------------------------------
// Public data types
// ---------------------------------------------------------------------------

/// An admitted order together with the signed form it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOrder {
    pub order_id: OrderId,
    pub order: LimitOrder,
    pub signed: SignedLimitOrder,
}

impl StoredOrder {
    /// Wrap the signed order for re-transmission.
    pub fn to_envelope(&self) -> Result<Envelope, ObjectError> {
        Envelope::limit_order(&self.signed)
    }
}

/// A freshly signed local order, ready to be applied and broadcast.
#[derive(Debug, Clone)]
pub struct LocalOrder {
    pub order_id: OrderId,
    /// Event to enqueue so the order lands in our own book.
    pub event: NodeEvent,
    /// Envelope to publish on the gossip topic.
    pub envelope: Envelope,
}

/// Outcome of [`OrderBook::process_incoming_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Inserted(OrderId),
    Duplicate(OrderId),
    Rejected(OrderRejection),
}

/// Outcome of [`OrderBook::process_withdrawal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Withdrawal {
    Removed(OrderId),
    /// Nothing to remove. Also covers a withdrawal that raced its order.
    Unknown,
    Rejected(OrderRejection),
}

#[derive(Default)]
struct BookState {
    orders: HashMap<OrderId, StoredOrder>,
    mine: HashSet<OrderId>,
}

// ---------------------------------------------------------------------------
// OrderBook
// ---------------------------------------------------------------------------

/// Shared handle to the order book. Cloning is cheap.
#[derive(Clone)]
pub struct OrderBook {
    state: Arc<RwLock<BookState>>,
    keys: Arc<dyn KeyResolver>,
    order_ttl: Duration,
}

impl OrderBook {
    pub fn new(keys: Arc<dyn KeyResolver>) -> Self {
        Self::with_ttl(keys, DEFAULT_ORDER_TTL)
    }

    pub fn with_ttl(keys: Arc<dyn KeyResolver>, order_ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(BookState::default())),
            keys,
            order_ttl,
        }
    }

    /// Build and sign a new order originating from this node.
    ///
    /// Nothing is stored here. The returned event must go through the event
    /// loop like any other order.
    pub fn submit_local(
        &self,
        quantity: u64,
        price: u64,
        buy_btc: bool,
        signer: &dyn Signer,
        self_peer_id: &PeerId,
    ) -> Result<LocalOrder, SubmitError> {
        let order = LimitOrder {
            peer_id: self_peer_id.to_string(),
            expiry: expiry_after(unix_now(), self.order_ttl),
            quantity,
            price,
            buy_btc,
        };
        let order_id = order.order_id()?;
        let signed = SignedLimitOrder::sign(&order, signer)?;
        let envelope = Envelope::limit_order(&signed)?;
        let event = NodeEvent::NewOrder {
            bytes: Bytes::from(signed.to_bytes()?),
            is_mine: true,
        };
        debug!(order_id = %order_id, quantity, price, buy_btc, "Signed local order");
        Ok(LocalOrder {
            order_id,
            event,
            envelope,
        })
    }

    /// Validate an encoded `SignedLimitOrder` and insert it if new.
    pub async fn process_incoming_order(&self, bytes: &[u8], is_mine: bool) -> Admission {
        self.process_incoming_order_at(bytes, is_mine, unix_now()).await
    }

    pub async fn process_incoming_order_at(
        &self,
        bytes: &[u8],
        is_mine: bool,
        now: i64,
    ) -> Admission {
        let (order_id, order, signed) = match decode_order(bytes) {
            Ok(decoded) => decoded,
            Err(reason) => {
                warn!(error = %reason, "Dropping undecodable order");
                return Admission::Rejected(reason);
            }
        };

        if self.state.read().await.orders.contains_key(&order_id) {
            debug!(order_id = %order_id, "Order already known");
            return Admission::Duplicate(order_id);
        }

        if let Err(reason) = self.verify_order(&order, &signed, now) {
            warn!(order_id = %order_id, peer = %order.peer_id, error = %reason, "Rejected order");
            return Admission::Rejected(reason);
        }

        let mut state = self.state.write().await;
        if state.orders.contains_key(&order_id) {
            return Admission::Duplicate(order_id);
        }
        state.orders.insert(
            order_id.clone(),
            StoredOrder {
                order_id: order_id.clone(),
                order,
                signed,
            },
        );
        if is_mine {
            state.mine.insert(order_id.clone());
        }
        info!(order_id = %order_id, mine = is_mine, "Added order to order book");
        Admission::Inserted(order_id)
    }

    /// Validate an encoded `SignedRemoveOrder` and drop the order it names.
    ///
    /// The withdrawal must be signed by the key behind the stored order's
    /// `peer_id`, over the order id string exactly as carried.
    pub async fn process_withdrawal(&self, bytes: &[u8], is_mine: bool) -> Withdrawal {
        let request = match SignedRemoveOrder::from_bytes(bytes) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable withdrawal");
                return Withdrawal::Rejected(e.into());
            }
        };
        let order_id = match ContentId::parse(&request.order_id) {
            Ok(id) => id,
            Err(e) => {
                warn!(order_id = %request.order_id, error = %e, "Withdrawal names a malformed order id");
                return Withdrawal::Rejected(OrderRejection::Decode(e.to_string()));
            }
        };

        let originator = match self.state.read().await.orders.get(&order_id) {
            Some(stored) => stored.order.peer_id.clone(),
            None => {
                debug!(order_id = %order_id, "Withdrawal for unknown order");
                return Withdrawal::Unknown;
            }
        };

        if let Err(reason) = self.verify_withdrawal(&originator, &request) {
            warn!(order_id = %order_id, error = %reason, "Rejected withdrawal");
            return Withdrawal::Rejected(reason);
        }

        let mut state = self.state.write().await;
        if state.orders.remove(&order_id).is_none() {
            return Withdrawal::Unknown;
        }
        state.mine.remove(&order_id);
        info!(order_id = %order_id, mine = is_mine, "Removed order from order book");
        Withdrawal::Removed(order_id)
    }

    /// Drop every order whose expiry is at or before `now`.
    pub async fn sweep_expired(&self, now: i64) -> usize {
        let mut state = self.state.write().await;
        let before = state.orders.len();
        state.orders.retain(|_, stored| !stored.order.is_expired_at(now));
        let BookState { orders, mine } = &mut *state;
        mine.retain(|id| orders.contains_key(id));
        let removed = before - orders.len();
        if removed > 0 {
            debug!(removed, remaining = orders.len(), "Swept expired orders");
        }
        removed
    }

    /// Snapshot of every stored order.
    pub async fn open_orders(&self) -> Vec<StoredOrder> {
        self.state.read().await.orders.values().cloned().collect()
    }

    /// Snapshot of every stored order, each paired with whether it is ours.
    pub async fn entries(&self) -> Vec<(StoredOrder, bool)> {
        let state = self.state.read().await;
        state
            .orders
            .values()
            .map(|stored| (stored.clone(), state.mine.contains(&stored.order_id)))
            .collect()
    }

    /// Snapshot of the orders this node originated.
    pub async fn my_orders(&self) -> Vec<StoredOrder> {
        let state = self.state.read().await;
        state
            .mine
            .iter()
            .filter_map(|id| state.orders.get(id).cloned())
            .collect()
    }

    /// The stored order and whether it is ours.
    pub async fn lookup(&self, order_id: &OrderId) -> Result<(StoredOrder, bool), OrderBookError> {
        let state = self.state.read().await;
        let stored = state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| OrderBookError::NotFound(order_id.clone()))?;
        Ok((stored, state.mine.contains(order_id)))
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.orders.is_empty()
    }

    fn verify_order(
        &self,
        order: &LimitOrder,
        signed: &SignedLimitOrder,
        now: i64,
    ) -> Result<(), OrderRejection> {
        let key = self.keys.recover_public_key(&order.peer_id)?;
        key.verify(&signed.serialized_limit_order, &signed.signature)
            .map_err(|_| OrderRejection::SignatureInvalid)?;
        if order.is_expired_at(now) {
            return Err(OrderRejection::Expired {
                expiry: order.expiry,
            });
        }
        Ok(())
    }

    fn verify_withdrawal(
        &self,
        originator: &str,
        request: &SignedRemoveOrder,
    ) -> Result<(), OrderRejection> {
        let key = self.keys.recover_public_key(originator)?;
        key.verify(request.order_id.as_bytes(), &request.signature)
            .map_err(|_| OrderRejection::SignatureInvalid)
    }
}

fn decode_order(bytes: &[u8]) -> Result<(OrderId, LimitOrder, SignedLimitOrder), OrderRejection> {
    let signed = SignedLimitOrder::from_bytes(bytes)?;
    let order = signed.limit_order()?;
    let order_id = order.order_id()?;
    Ok((order_id, order, signed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapbook_sdk::{Keypair, SelfCertifying};

    const NOW: i64 = 1_700_000_000;

    fn book() -> OrderBook {
        OrderBook::new(Arc::new(SelfCertifying))
    }

    fn signed_bytes(keypair: &Keypair, expiry: i64, quantity: u64) -> (OrderId, Vec<u8>) {
        let order = LimitOrder {
            peer_id: keypair.peer_id().to_string(),
            expiry,
            quantity,
            price: 5000,
            buy_btc: true,
        };
        let signed = SignedLimitOrder::sign(&order, keypair).unwrap();
        (order.order_id().unwrap(), signed.to_bytes().unwrap())
    }

    fn withdrawal_bytes(order_id: &OrderId, keypair: &Keypair) -> Vec<u8> {
        SignedRemoveOrder::sign(order_id, keypair)
            .unwrap()
            .to_bytes()
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_duplicate() {
        let book = book();
        let keypair = Keypair::generate().unwrap();
        let (id, bytes) = signed_bytes(&keypair, NOW + 60, 10);

        assert_eq!(
            book.process_incoming_order_at(&bytes, false, NOW).await,
            Admission::Inserted(id.clone())
        );
        assert_eq!(
            book.process_incoming_order_at(&bytes, false, NOW).await,
            Admission::Duplicate(id.clone())
        );
        assert_eq!(book.len().await, 1);

        let (stored, mine) = book.lookup(&id).await.unwrap();
        assert!(!mine);
        assert_eq!(stored.order.quantity, 10);
        assert_eq!(stored.order_id, id);
    }

    #[tokio::test]
    async fn test_rejects_bad_signature() {
        let book = book();
        let keypair = Keypair::generate().unwrap();
        let (_, bytes) = signed_bytes(&keypair, NOW + 60, 10);
        let mut signed = SignedLimitOrder::from_bytes(&bytes).unwrap();
        signed.signature[0] ^= 0x01;

        assert_eq!(
            book.process_incoming_order_at(&signed.to_bytes().unwrap(), false, NOW)
                .await,
            Admission::Rejected(OrderRejection::SignatureInvalid)
        );
        assert!(book.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejects_tampered_payload() {
        let book = book();
        let keypair = Keypair::generate().unwrap();
        let (_, bytes) = signed_bytes(&keypair, NOW + 60, 10);
        let mut signed = SignedLimitOrder::from_bytes(&bytes).unwrap();
        // Last byte is the buy_btc flag.
        let last = signed.serialized_limit_order.len() - 1;
        signed.serialized_limit_order[last] ^= 0x01;

        assert_eq!(
            book.process_incoming_order_at(&signed.to_bytes().unwrap(), false, NOW)
                .await,
            Admission::Rejected(OrderRejection::SignatureInvalid)
        );
        assert!(book.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejects_order_signed_by_someone_else() {
        let book = book();
        let owner = Keypair::generate().unwrap();
        let forger = Keypair::generate().unwrap();
        let order = LimitOrder {
            peer_id: owner.peer_id().to_string(),
            expiry: NOW + 60,
            quantity: 1,
            price: 1,
            buy_btc: false,
        };
        let forged = SignedLimitOrder::sign(&order, &forger).unwrap();

        assert_eq!(
            book.process_incoming_order_at(&forged.to_bytes().unwrap(), false, NOW)
                .await,
            Admission::Rejected(OrderRejection::SignatureInvalid)
        );
    }

    #[tokio::test]
    async fn test_rejects_expired_and_garbage() {
        let book = book();
        let keypair = Keypair::generate().unwrap();
        let (_, expired) = signed_bytes(&keypair, NOW, 10);

        assert_eq!(
            book.process_incoming_order_at(&expired, false, NOW).await,
            Admission::Rejected(OrderRejection::Expired { expiry: NOW })
        );
        assert!(matches!(
            book.process_incoming_order_at(b"\x01\x02", false, NOW).await,
            Admission::Rejected(OrderRejection::Decode(_))
        ));

        let order = LimitOrder {
            peer_id: "knot-a-peer".to_string(),
            expiry: NOW + 60,
            quantity: 1,
            price: 1,
            buy_btc: false,
        };
        let signed = SignedLimitOrder::sign(&order, &keypair).unwrap();
        assert!(matches!(
            book.process_incoming_order_at(&signed.to_bytes().unwrap(), false, NOW)
                .await,
            Admission::Rejected(OrderRejection::UnknownSigner(_))
        ));
        assert!(book.is_empty().await);
    }

    #[tokio::test]
    async fn test_submit_local_signs_for_self() {
        let book = book();
        let keypair = Keypair::generate().unwrap();
        let local = book
            .submit_local(10, 5000, true, &keypair, &keypair.peer_id())
            .unwrap();

        let NodeEvent::NewOrder { bytes, is_mine } = &local.event else {
            unreachable!("unexpected event {:?}", local.event);
        };
        assert!(*is_mine);
        assert_eq!(
            local.envelope.payload_bytes::<SignedLimitOrder>().unwrap(),
            &bytes[..]
        );
        assert_eq!(
            book.process_incoming_order(bytes, true).await,
            Admission::Inserted(local.order_id.clone())
        );

        let (stored, mine) = book.lookup(&local.order_id).await.unwrap();
        assert!(mine);
        assert_eq!(stored.order.peer_id, keypair.peer_id().to_string());
        let ttl = stored.order.expiry - unix_now();
        assert!(ttl > 2_592_000 - 60 && ttl <= 2_592_000);
        assert_eq!(book.my_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_withdrawal_by_owner_removes_order() {
        let book = book();
        let keypair = Keypair::generate().unwrap();
        let (id, bytes) = signed_bytes(&keypair, NOW + 60, 10);
        book.process_incoming_order_at(&bytes, true, NOW).await;

        assert_eq!(
            book.process_withdrawal(&withdrawal_bytes(&id, &keypair), false)
                .await,
            Withdrawal::Removed(id.clone())
        );
        assert!(book.is_empty().await);
        assert!(book.my_orders().await.is_empty());
        assert_eq!(
            book.lookup(&id).await,
            Err(OrderBookError::NotFound(id.clone()))
        );

        // A replay finds nothing.
        assert_eq!(
            book.process_withdrawal(&withdrawal_bytes(&id, &keypair), false)
                .await,
            Withdrawal::Unknown
        );
    }

    #[tokio::test]
    async fn test_withdrawal_by_stranger_is_ignored() {
        let book = book();
        let owner = Keypair::generate().unwrap();
        let stranger = Keypair::generate().unwrap();
        let (id, bytes) = signed_bytes(&owner, NOW + 60, 10);
        book.process_incoming_order_at(&bytes, false, NOW).await;

        assert_eq!(
            book.process_withdrawal(&withdrawal_bytes(&id, &stranger), false)
                .await,
            Withdrawal::Rejected(OrderRejection::SignatureInvalid)
        );
        assert_eq!(book.len().await, 1);
    }

    #[tokio::test]
    async fn test_withdrawal_before_order_is_dropped() {
        let book = book();
        let keypair = Keypair::generate().unwrap();
        let (id, bytes) = signed_bytes(&keypair, NOW + 60, 10);

        assert_eq!(
            book.process_withdrawal(&withdrawal_bytes(&id, &keypair), false)
                .await,
            Withdrawal::Unknown
        );
        book.process_incoming_order_at(&bytes, false, NOW).await;
        assert_eq!(book.len().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_mine_a_subset() {
        let book = book();
        let keypair = Keypair::generate().unwrap();
        let (short_id, short) = signed_bytes(&keypair, NOW + 10, 1);
        let (long_id, long) = signed_bytes(&keypair, NOW + 1000, 2);
        book.process_incoming_order_at(&short, true, NOW).await;
        book.process_incoming_order_at(&long, false, NOW).await;

        assert_eq!(book.sweep_expired(NOW + 10).await, 1);
        assert!(book.lookup(&short_id).await.is_err());
        assert!(book.lookup(&long_id).await.is_ok());
        assert!(book.my_orders().await.is_empty());
        assert_eq!(book.sweep_expired(NOW + 10).await, 0);
    }
}
