//! Wire codec for cross-instance invalidation messages.
//!
//! A message is a flat JSON object with exactly three string-valued fields:
//! `cache` (the cache name), `key` (the key rendered as a literal), and
//! `type` (the tag that selects the decoder for `key`). Only keys from the
//! closed [`KeyType`] enumeration travel on the wire; anything else is
//! rejected at publish time, never at decode time.

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Fixed name of the shared notification channel all instances subscribe to.
pub const INVALIDATION_CHANNEL: &str = "lattice_cache_invalidation";

/// Upper bound on an encoded message, kept under the PostgreSQL NOTIFY
/// payload limit (just below 8000 bytes).
pub const MAX_PAYLOAD_BYTES: usize = 7800;

/// Closed enumeration of key types that can cross the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    /// 64-bit signed integer, rendered in decimal.
    #[serde(rename = "int64")]
    Int64,
    /// UTF-8 text, carried verbatim.
    #[serde(rename = "text")]
    Text,
}

/// A decoded invalidation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WireKey {
    Int64(i64),
    Text(String),
}

impl WireKey {
    /// The type tag this key travels under.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Int64(_) => KeyType::Int64,
            Self::Text(_) => KeyType::Text,
        }
    }

    /// Render the key as the string literal carried in the `key` field.
    #[must_use]
    pub fn literal(&self) -> String {
        match self {
            Self::Int64(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

/// One cross-instance invalidation, as it appears on the wire.
///
/// The sender's session tag is carried by the transport, not the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    /// Name of the cache holding the stale entry.
    pub cache: String,
    /// The stale key, rendered as a string literal.
    pub key: String,
    /// Tag selecting the decoder for `key`.
    #[serde(rename = "type")]
    pub key_type: KeyType,
}

impl InvalidationMessage {
    /// Build a message for one stale key.
    #[must_use]
    pub fn new(cache: impl Into<String>, key: &WireKey) -> Self {
        Self {
            cache: cache.into(),
            key: key.literal(),
            key_type: key.key_type(),
        }
    }

    /// Decode the `key` field according to the message's type tag.
    pub fn decode_key(&self) -> Result<WireKey> {
        match self.key_type {
            KeyType::Int64 => self
                .key
                .parse::<i64>()
                .map(WireKey::Int64)
                .map_err(|e| CacheError::decode(format!("bad int64 key {:?}: {e}", self.key))),
            KeyType::Text => Ok(WireKey::Text(self.key.clone())),
        }
    }

    /// Encode to the JSON payload, enforcing the channel's size limit.
    pub fn encode(&self) -> Result<String> {
        let payload =
            serde_json::to_string(self).map_err(|e| CacheError::decode(e.to_string()))?;
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(CacheError::PayloadTooLarge(payload.len()));
        }
        Ok(payload)
    }

    /// Decode a received JSON payload. An unknown `type` tag fails here,
    /// before any cache is touched.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| CacheError::decode(e.to_string()))
    }
}
