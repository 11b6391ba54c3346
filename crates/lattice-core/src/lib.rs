//! Core types shared by the Lattice cache-invalidation subsystem.
//!
//! This crate defines the error taxonomy, the wire codec for invalidation
//! messages, session tags for self-origin suppression, and the [`CacheKey`]
//! trait that ties a cache's key type to the wire format.

pub mod error;
pub mod key;
pub mod session;
pub mod wire;

pub use error::{CacheError, Result};
pub use key::CacheKey;
pub use session::SessionTag;
pub use wire::{INVALIDATION_CHANNEL, InvalidationMessage, KeyType, MAX_PAYLOAD_BYTES, WireKey};
