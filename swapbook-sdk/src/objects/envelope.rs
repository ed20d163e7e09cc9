//! The typed wrapper every wire and gossip message travels in.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::order::{SignedLimitOrder, SignedRemoveOrder};
use super::{ObjectError, WireObject};

/// Discriminant of an [`Envelope`].
///
/// Values outside the known range decode to [`MessageType::Unknown`] instead
/// of failing, so a newer peer cannot break an older one by sending a new
/// kind of message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    LimitOrder,
    OrderClose,
    GetOrderBook,
    Unknown(u32),
}

impl From<u32> for MessageType {
    fn from(value: u32) -> Self {
        match value {
            0 => MessageType::LimitOrder,
            1 => MessageType::OrderClose,
            2 => MessageType::GetOrderBook,
            other => MessageType::Unknown(other),
        }
    }
}

impl From<MessageType> for u32 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::LimitOrder => 0,
            MessageType::OrderClose => 1,
            MessageType::GetOrderBook => 2,
            MessageType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::LimitOrder => write!(f, "LimitOrder"),
            MessageType::OrderClose => write!(f, "OrderClose"),
            MessageType::GetOrderBook => write!(f, "GetOrderBook"),
            MessageType::Unknown(tag) => write!(f, "Unknown({tag})"),
        }
    }
}

/// Type-tagged opaque body. Decoding is deferred until the kind is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub type_url: String,
    pub value: Vec<u8>,
}

impl Payload {
    pub fn pack<T: WireObject>(object: &T) -> Result<Self, ObjectError> {
        Ok(Self {
            type_url: T::TYPE_URL.to_string(),
            value: object.to_bytes()?,
        })
    }

    /// The raw body, after checking it is tagged as a `T`.
    pub fn value_of<T: WireObject>(&self) -> Result<&[u8], ObjectError> {
        if self.type_url != T::TYPE_URL {
            return Err(ObjectError::UnexpectedType {
                expected: T::TYPE_URL,
                found: self.type_url.clone(),
            });
        }
        Ok(&self.value)
    }

    pub fn unpack<T: WireObject>(&self) -> Result<T, ObjectError> {
        T::from_bytes(self.value_of::<T>()?)
    }
}

/// The wire unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    message_type: u32,
    payload: Option<Payload>,
}

impl WireObject for Envelope {
    const TYPE_URL: &'static str = "swapbook.Envelope";
}

impl Envelope {
    pub fn new(message_type: MessageType, payload: Option<Payload>) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
        }
    }

    pub fn limit_order(signed: &SignedLimitOrder) -> Result<Self, ObjectError> {
        Ok(Self::new(
            MessageType::LimitOrder,
            Some(Payload::pack(signed)?),
        ))
    }

    pub fn order_close(signed: &SignedRemoveOrder) -> Result<Self, ObjectError> {
        Ok(Self::new(
            MessageType::OrderClose,
            Some(Payload::pack(signed)?),
        ))
    }

    pub fn get_order_book() -> Self {
        Self::new(MessageType::GetOrderBook, None)
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type.into()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Raw payload bytes, checked to be tagged as a `T`.
    pub fn payload_bytes<T: WireObject>(&self) -> Result<&[u8], ObjectError> {
        self.payload
            .as_ref()
            .ok_or(ObjectError::MissingPayload)?
            .value_of::<T>()
    }
}
