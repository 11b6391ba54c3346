use std::hash::Hash;
use std::time::Duration;

use moka::future::Cache;

/// Eviction and expiry policy for one named cache.
///
/// All bounds are optional and combine freely: a size cap evicts on a
/// least-recently-used approximation, `time_to_live` expires entries a fixed
/// interval after write, and `time_to_idle` expires them after the last
/// access. The platform's standard combinations:
///
/// - reference tables: size-capped loading cache, no expiry
/// - per-user session artifacts: size cap + `time_to_idle`
/// - rate-limit counters: size cap + `time_to_idle`
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    max_entries: Option<u64>,
    time_to_live: Option<Duration>,
    time_to_idle: Option<Duration>,
}

impl CachePolicy {
    /// An unbounded policy; combine with the builder methods below.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the entry count. Eviction is approximate LRU, applied by the
    /// underlying store's housekeeping rather than synchronously on insert.
    #[must_use]
    pub fn with_max_entries(mut self, max: u64) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Expire entries a fixed interval after they were written.
    #[must_use]
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Expire entries a fixed interval after they were last read or written.
    #[must_use]
    pub fn with_time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self
    }

    /// The configured entry cap, if any.
    #[must_use]
    pub fn max_entries(&self) -> Option<u64> {
        self.max_entries
    }

    pub(crate) fn build<K, V>(&self) -> Cache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut builder = Cache::builder();
        if let Some(max) = self.max_entries {
            builder = builder.max_capacity(max);
        }
        if let Some(ttl) = self.time_to_live {
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = self.time_to_idle {
            builder = builder.time_to_idle(tti);
        }
        builder.build()
    }
}
