//! Limit orders and their signed wrappers.

use serde::{Deserialize, Serialize};

use super::{ObjectError, WireObject};
use crate::content::{ContentId, OrderId};
use crate::signature::{SignatureError, Signer};

/// An unsigned trading intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LimitOrder {
    /// Self-certifying identity of the originator.
    pub peer_id: String,
    /// Absolute unix timestamp (seconds) after which the order is void.
    pub expiry: i64,
    pub quantity: u64,
    pub price: u64,
    pub buy_btc: bool,
}

impl WireObject for LimitOrder {
    const TYPE_URL: &'static str = "swapbook.LimitOrder";
}

impl LimitOrder {
    /// Content id of the canonical serialization of this order.
    pub fn order_id(&self) -> Result<OrderId, ObjectError> {
        Ok(ContentId::of(&self.to_bytes()?))
    }

    /// Whether the order is no longer live at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiry <= now
    }
}

/// A limit order together with the exact bytes that were signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedLimitOrder {
    pub serialized_limit_order: Vec<u8>,
    pub signature: Vec<u8>,
}

impl WireObject for SignedLimitOrder {
    const TYPE_URL: &'static str = "swapbook.SignedLimitOrder";
}

/// Errors produced while signing a wire object.
#[derive(Debug, thiserror::Error)]
pub enum SignObjectError {
    #[error(transparent)]
    Object(#[from] ObjectError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl SignedLimitOrder {
    /// Serialize `order` and sign the resulting bytes.
    pub fn sign(order: &LimitOrder, signer: &dyn Signer) -> Result<Self, SignObjectError> {
        let serialized_limit_order = order.to_bytes()?;
        let signature = signer.sign(&serialized_limit_order)?;
        Ok(Self {
            serialized_limit_order,
            signature,
        })
    }

    /// Decode the nested unsigned order.
    pub fn limit_order(&self) -> Result<LimitOrder, ObjectError> {
        LimitOrder::from_bytes(&self.serialized_limit_order)
    }
}

/// A request to withdraw an order, signed by the order's originator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRemoveOrder {
    pub order_id: String,
    /// Signature over the UTF-8 bytes of `order_id`.
    pub signature: Vec<u8>,
}

impl WireObject for SignedRemoveOrder {
    const TYPE_URL: &'static str = "swapbook.SignedRemoveOrder";
}

impl SignedRemoveOrder {
    pub fn sign(order_id: &OrderId, signer: &dyn Signer) -> Result<Self, SignatureError> {
        let signature = signer.sign(order_id.as_str().as_bytes())?;
        Ok(Self {
            order_id: order_id.to_string(),
            signature,
        })
    }
}
