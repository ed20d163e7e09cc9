//! Self-certifying peer identities.
//!
//! A [`PeerId`] embeds the peer's Ed25519 public key, so a signature made by
//! a peer can be checked without any certificate authority: recover the key
//! from the id and verify. Nodes consume this capability through the
//! [`KeyResolver`] trait so a different identity scheme can be plugged in by
//! the transport layer.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::encoding::{decode_base32, encode_base32};
use crate::signature::{PUBLIC_KEY_LEN, PublicKey};

const PEER_ID_PREFIX: char = 'k';
const ED25519_PUB_CODEC: [u8; 2] = [0xed, 0x01];

/// Errors produced when decoding an identity string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("missing peer id prefix")]
    MissingPrefix,
    #[error("invalid base32 encoding")]
    InvalidBase32,
    #[error("unsupported key codec")]
    UnsupportedCodec,
    #[error("invalid public key length {0}")]
    InvalidKeyLength(usize),
}

/// Identity of a peer on the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(CompactString);

impl PeerId {
    /// Derive the identity of the holder of `key`.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let mut raw = Vec::with_capacity(ED25519_PUB_CODEC.len() + PUBLIC_KEY_LEN);
        raw.extend_from_slice(&ED25519_PUB_CODEC);
        raw.extend_from_slice(key.as_bytes());
        let mut text = CompactString::default();
        text.push(PEER_ID_PREFIX);
        text.push_str(&encode_base32(&raw));
        Self(text)
    }

    /// Parse and validate an identity string.
    pub fn parse(text: &str) -> Result<Self, IdentityError> {
        let key = decode_key(text)?;
        Ok(Self::from_public_key(&key))
    }

    /// Recover the public key embedded in this identity.
    pub fn public_key(&self) -> Result<PublicKey, IdentityError> {
        decode_key(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map_or(self.0.len(), |(index, _)| index);
        &self.0[..end]
    }
}

fn decode_key(text: &str) -> Result<PublicKey, IdentityError> {
    let body = text
        .strip_prefix(PEER_ID_PREFIX)
        .ok_or(IdentityError::MissingPrefix)?;
    let raw = decode_base32(body).ok_or(IdentityError::InvalidBase32)?;
    let key = raw
        .strip_prefix(ED25519_PUB_CODEC.as_slice())
        .ok_or(IdentityError::UnsupportedCodec)?;
    PublicKey::from_bytes(key).map_err(|_| IdentityError::InvalidKeyLength(key.len()))
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PeerId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PeerId> for String {
    fn from(value: PeerId) -> Self {
        value.0.into()
    }
}

impl FromStr for PeerId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Recovers the signing key behind an identity string.
pub trait KeyResolver: Send + Sync {
    fn recover_public_key(&self, identity: &str) -> Result<PublicKey, IdentityError>;
}

/// Resolver for identities produced by [`PeerId::from_public_key`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfCertifying;

impl KeyResolver for SelfCertifying {
    fn recover_public_key(&self, identity: &str) -> Result<PublicKey, IdentityError> {
        decode_key(identity)
    }
}
