//! Content addressing.
//!
//! A [`ContentId`] is a CIDv1-shaped identifier: multibase prefix `b`
//! followed by lowercase base32 of
//!
//! ```text
//! 0x01 (cid v1) | 0x55 (raw) | 0x12 (sha2-256) | 0x20 (len) | sha256(bytes)
//! ```
//!
//! Order ids and the discovery rendezvous key are both content ids, so they
//! are stable across transmission paths and independent of arrival order.

use compact_str::CompactString;
use ring::digest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::encoding::{decode_base32, encode_base32};

const MULTIBASE_BASE32: char = 'b';
const CID_HEADER: [u8; 4] = [0x01, 0x55, 0x12, 0x20];
const DIGEST_LEN: usize = 32;

/// Order ids are content ids of the canonical unsigned order bytes.
pub type OrderId = ContentId;

/// Errors produced when parsing a [`ContentId`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentIdError {
    #[error("missing multibase prefix")]
    MissingPrefix,
    #[error("invalid base32 encoding")]
    InvalidBase32,
    #[error("unsupported cid header")]
    InvalidHeader,
    #[error("invalid digest length {0}")]
    InvalidLength(usize),
}

/// A content address over arbitrary bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(CompactString);

impl ContentId {
    /// Hash `bytes` with SHA-256 and wrap the digest as a content id.
    pub fn of(bytes: &[u8]) -> Self {
        let hash = digest::digest(&digest::SHA256, bytes);
        let mut raw = Vec::with_capacity(CID_HEADER.len() + DIGEST_LEN);
        raw.extend_from_slice(&CID_HEADER);
        raw.extend_from_slice(hash.as_ref());
        Self::from_raw(&raw)
    }

    /// Parse and validate the textual form.
    ///
    /// The returned id is re-encoded, so ids that differ only in letter case
    /// compare equal after parsing.
    pub fn parse(text: &str) -> Result<Self, ContentIdError> {
        let body = text
            .strip_prefix(MULTIBASE_BASE32)
            .ok_or(ContentIdError::MissingPrefix)?;
        let raw = decode_base32(body).ok_or(ContentIdError::InvalidBase32)?;
        if raw.len() < CID_HEADER.len() || raw[..CID_HEADER.len()] != CID_HEADER {
            return Err(ContentIdError::InvalidHeader);
        }
        let digest_len = raw.len() - CID_HEADER.len();
        if digest_len != DIGEST_LEN {
            return Err(ContentIdError::InvalidLength(digest_len));
        }
        Ok(Self::from_raw(&raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_raw(raw: &[u8]) -> Self {
        let mut text = CompactString::with_capacity(1 + raw.len() * 8 / 5 + 1);
        text.push(MULTIBASE_BASE32);
        text.push_str(&encode_base32(raw));
        Self(text)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = ContentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(value: ContentId) -> Self {
        value.0.into()
    }
}

impl FromStr for ContentId {
    type Err = ContentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
