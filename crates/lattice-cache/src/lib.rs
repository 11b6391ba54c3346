//! Named in-process caches with per-cache eviction and loading policies.
//!
//! A [`CacheRegistry`] owns every cache in the process, keyed by a unique
//! name. Registration hands back a typed [`CacheHandle`] so callers get
//! compile-time key/value types; the string name only matters again when an
//! invalidation arrives from another instance. Cross-instance propagation
//! goes through the [`InvalidationSink`] seam, wired in at startup by the
//! invalidation layer.

pub mod handle;
pub mod policy;
pub mod registry;
pub mod sink;

pub use handle::{CacheHandle, Loader};
pub use policy::CachePolicy;
pub use registry::CacheRegistry;
pub use sink::InvalidationSink;
