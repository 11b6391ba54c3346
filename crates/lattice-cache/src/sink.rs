use async_trait::async_trait;
use lattice_core::{Result, WireKey};

/// Outbound seam between the cache layer and whatever broadcasts
/// invalidations to other instances.
///
/// The local entry has already been removed by the time `publish` is called;
/// implementations treat the broadcast as best-effort and must not re-enter
/// the cache layer. Transport failures are handled (logged and dropped)
/// inside the implementation; an `Err` from `publish` is reserved for
/// encode-class failures that the `invalidate` caller should see.
#[async_trait]
pub trait InvalidationSink: Send + Sync {
    /// Broadcast that `key` in the named cache is stale.
    async fn publish(&self, cache: &str, key: WireKey) -> Result<()>;
}
