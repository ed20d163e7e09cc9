//! Objects exchanged between nodes and with HTTP clients.
//!
//! Wire objects are encoded with bincode using fixed-width integers, which
//! makes the encoding of a given value canonical. That property is what
//! lets order ids be computed from a re-serialization of the decoded order.

pub mod api;
pub mod envelope;
pub mod order;

pub use envelope::{Envelope, MessageType, Payload};
pub use order::{LimitOrder, SignedLimitOrder, SignedRemoveOrder};

use bincode::Options;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Upper bound for any single decoded object.
///
/// Guards against hostile length prefixes inside untrusted payloads.
pub const MAX_OBJECT_SIZE: u64 = 4 * 1024 * 1024;

/// Errors produced while encoding or decoding wire objects.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("encode error: {0}")]
    Encode(bincode::Error),
    #[error("decode error: {0}")]
    Decode(bincode::Error),
    #[error("missing payload")]
    MissingPayload,
    #[error("unexpected payload type {found}, expected {expected}")]
    UnexpectedType {
        expected: &'static str,
        found: String,
    },
}

/// A type that travels on the wire, optionally inside a [`Payload`].
pub trait WireObject: Serialize + DeserializeOwned {
    /// Tag written into [`Payload::type_url`].
    const TYPE_URL: &'static str;

    fn to_bytes(&self) -> Result<Vec<u8>, ObjectError> {
        codec().serialize(self).map_err(ObjectError::Encode)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ObjectError> {
        codec().deserialize(bytes).map_err(ObjectError::Decode)
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_OBJECT_SIZE)
}
