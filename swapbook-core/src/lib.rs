#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod events;
pub mod net;
pub mod node;
pub mod orderbook;
pub mod processors;
pub mod publisher;
pub mod utils;
pub mod wire;

pub use node::{NodeError, NodeHandle, NodeParts, SwapNode};
