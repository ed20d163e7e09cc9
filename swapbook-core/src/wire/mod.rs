//! Direct peer-to-peer messaging on the swap protocol.
//!
//! One envelope per stream in each direction. Frames carry a 4-byte
//! big-endian length prefix followed by the bincode-encoded envelope.

mod codec;
mod service;

pub use codec::{MAX_MESSAGE_SIZE, read_envelope, write_envelope};
pub use service::WireService;

use swapbook_sdk::objects::ObjectError;

use crate::net::NetError;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed envelope: {0}")]
    Decode(ObjectError),
    #[error("failed to encode envelope: {0}")]
    Encode(ObjectError),
    #[error("peer closed the stream")]
    PeerDisconnected,
    #[error("cannot reach peer: {0}")]
    PeerUnreachable(#[from] NetError),
    #[error("node event loop is gone")]
    EventLoopClosed,
}
