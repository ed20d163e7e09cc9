//! Signature scheme for orders and withdrawals.
//!
//! Every signed object on the network uses Ed25519:
//!
//! * **Limit orders** are signed over the exact serialized unsigned-order
//!   bytes, and those bytes travel alongside the signature.
//! * **Withdrawals** are signed over the UTF-8 bytes of the order id.
//!
//! Verification always uses the carried bytes. Re-serializing a decoded
//! object before verifying is not guaranteed to reproduce what was signed.

use ring::rand::SystemRandom;
use ring::signature::{ED25519, Ed25519KeyPair, KeyPair, UnparsedPublicKey};
use std::fmt;

use crate::identity::PeerId;

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("key rejected: {0}")]
    KeyRejected(String),
    #[error("key generation failed")]
    KeyGeneration,
    #[error("invalid public key length {0}")]
    InvalidPublicKey(usize),
    #[error("invalid signature")]
    SignatureMismatch,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

impl From<ring::error::KeyRejected> for SignatureError {
    fn from(err: ring::error::KeyRejected) -> Self {
        Self::KeyRejected(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// An Ed25519 verification key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let key: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidPublicKey(bytes.len()))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        UnparsedPublicKey::new(&ED25519, &self.0).verify(message, signature)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Anything that can sign on behalf of a peer identity.
///
/// The node only ever needs "who am I" and "sign these bytes", so key
/// storage stays outside of the protocol code.
pub trait Signer: Send + Sync {
    fn peer_id(&self) -> PeerId;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignatureError>;
}

/// An Ed25519 key pair held in memory, stored on disk as PKCS#8.
pub struct Keypair {
    inner: Ed25519KeyPair,
    pkcs8: Box<[u8]>,
}

impl Keypair {
    /// Generate a fresh key pair from the system RNG.
    pub fn generate() -> Result<Self, SignatureError> {
        let rng = SystemRandom::new();
        let document =
            Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| SignatureError::KeyGeneration)?;
        Self::from_pkcs8(document.as_ref())
    }

    /// Load a key pair from its PKCS#8 v2 encoding.
    pub fn from_pkcs8(bytes: &[u8]) -> Result<Self, SignatureError> {
        let inner = Ed25519KeyPair::from_pkcs8(bytes)?;
        Ok(Self {
            inner,
            pkcs8: bytes.to_vec().into_boxed_slice(),
        })
    }

    /// The PKCS#8 document this key pair was loaded from.
    pub fn pkcs8(&self) -> &[u8] {
        &self.pkcs8
    }

    pub fn public_key(&self) -> PublicKey {
        let mut key = [0u8; PUBLIC_KEY_LEN];
        key.copy_from_slice(self.inner.public_key().as_ref());
        PublicKey(key)
    }
}

impl Signer for Keypair {
    fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.public_key())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignatureError> {
        Ok(self.inner.sign(message).as_ref().to_vec())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("peer_id", &self.peer_id())
            .finish_non_exhaustive()
    }
}
