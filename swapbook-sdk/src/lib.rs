//! Shared types for the swapbook order-book network.
//!
//! Everything that two nodes (or a node and its HTTP clients) must agree on
//! byte-for-byte lives here: wire objects, content ids, peer identities and
//! the Ed25519 signing scheme.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod content;
mod encoding;
pub mod identity;
pub mod objects;
pub mod signature;

pub use content::{ContentId, ContentIdError, OrderId};
pub use identity::{IdentityError, KeyResolver, PeerId, SelfCertifying};
pub use signature::{Keypair, PublicKey, SignatureError, Signer};
