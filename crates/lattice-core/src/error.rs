use thiserror::Error;

/// Result alias used throughout the cache subsystem.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Error types for cache and invalidation operations.
///
/// The enum is `Clone` because a single loader failure is shared by every
/// caller that was coalesced onto the same in-flight load.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Programming error: duplicate cache name, missing loader, or a handle
    /// requested with the wrong key/value types. Fatal at startup.
    #[error("Cache configuration error: {0}")]
    Configuration(String),

    /// The named cache was never registered.
    #[error("Unknown cache: {0}")]
    NotFound(String),

    /// The loader of a loading cache failed. Failures are never cached, so
    /// the next access retries the loader.
    #[error("Loader failed for key {key}: {message}")]
    Load { key: String, message: String },

    /// The key cannot be encoded for cross-instance broadcast. Local
    /// invalidation has already happened when this surfaces.
    #[error("Key type not supported for invalidation broadcast: {0}")]
    UnsupportedKeyType(&'static str),

    /// The encoded message would exceed the notification channel's payload
    /// limit ([`crate::wire::MAX_PAYLOAD_BYTES`]).
    #[error("Invalidation payload of {0} bytes exceeds the notification size limit")]
    PayloadTooLarge(usize),

    /// A received message or key literal did not decode.
    #[error("Malformed invalidation message: {0}")]
    Decode(String),
}

impl CacheError {
    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new NotFound error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new Load error from a loader's failure
    pub fn load(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}
