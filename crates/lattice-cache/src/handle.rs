use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures_util::future::BoxFuture;
use moka::future::Cache;
use tracing::debug;

use lattice_core::{CacheError, CacheKey, Result, WireKey};

use crate::policy::CachePolicy;
use crate::sink::InvalidationSink;

/// Loader for a loading cache: a pure async function from key to value.
pub type Loader<K, V> =
    Arc<dyn Fn(K) -> BoxFuture<'static, anyhow::Result<V>> + Send + Sync>;

/// Late-bound broadcast sink shared by the registry and every handle.
/// `arc-swap` needs a sized payload, hence the `Box` indirection.
pub(crate) type SinkCell = ArcSwapOption<Box<dyn InvalidationSink>>;

/// Typed read/write access to one named cache.
///
/// Handles are cheap to clone and share; all clones see the same entries.
/// The key and value types are fixed when the cache is registered, so there
/// is no runtime casting on the hot path.
pub struct CacheHandle<K, V> {
    inner: Arc<Inner<K, V>>,
}

struct Inner<K, V> {
    name: String,
    cache: Cache<K, V>,
    loader: Option<Loader<K, V>>,
    sink: Arc<SinkCell>,
}

impl<K, V> std::fmt::Debug for CacheHandle<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl<K, V> Clone for CacheHandle<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> CacheHandle<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        name: &str,
        policy: &CachePolicy,
        loader: Option<Loader<K, V>>,
        sink: Arc<SinkCell>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                cache: policy.build(),
                loader,
                sink,
            }),
        }
    }

    /// The cache's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Look up a key. Expired entries read as absent.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.cache.get(key).await
    }

    /// Insert or refresh an entry.
    pub async fn insert(&self, key: K, value: V) {
        self.inner.cache.insert(key, value).await;
    }

    /// Look up a key, running the cache's loader on a miss.
    ///
    /// At most one loader invocation is in flight per key; concurrent
    /// callers for the same missing key wait on that invocation and share
    /// its outcome. A loader failure surfaces as [`CacheError::Load`] to
    /// every waiter and is not cached, so the next call retries.
    pub async fn get_or_load(&self, key: &K) -> Result<V> {
        let loader = self.inner.loader.as_ref().ok_or_else(|| {
            CacheError::configuration(format!(
                "cache '{}' has no loader; use get/insert",
                self.inner.name
            ))
        })?;

        let load = {
            let loader = Arc::clone(loader);
            let key = key.clone();
            async move {
                let rendered = format!("{key:?}");
                loader(key)
                    .await
                    .map_err(|e| CacheError::load(rendered, format!("{e:#}")))
            }
        };

        self.inner
            .cache
            .try_get_with(key.clone(), load)
            .await
            .map_err(|shared: Arc<CacheError>| (*shared).clone())
    }

    /// Remove the entry for `key` if present. Idempotent.
    ///
    /// The local removal is synchronous: it is visible to local reads before
    /// this returns. With `propagate`, the removal is then broadcast through
    /// the registry's invalidation sink; that part is asynchronous and
    /// best-effort. A key that cannot be encoded for the wire fails with
    /// [`CacheError::UnsupportedKeyType`] after the local removal already
    /// took effect. Without a sink (propagation administratively disabled)
    /// the broadcast is a no-op.
    pub async fn invalidate(&self, key: &K, propagate: bool) -> Result<()> {
        self.inner.cache.invalidate(key).await;
        if !propagate {
            return Ok(());
        }
        let Some(sink) = self.inner.sink.load_full() else {
            debug!(cache = %self.inner.name, "No invalidation sink; skipping broadcast");
            return Ok(());
        };
        let wire = key.to_wire()?;
        sink.publish(&self.inner.name, wire).await
    }

    /// Number of live entries. Approximate until housekeeping has run; see
    /// [`CacheHandle::run_pending_tasks`].
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.cache.entry_count()
    }

    /// Run the underlying store's deferred housekeeping (eviction, expiry
    /// bookkeeping). Mostly useful to make counts exact in tests.
    pub async fn run_pending_tasks(&self) {
        self.inner.cache.run_pending_tasks().await;
    }

    /// Type-erased remote invalidation: decode the wire key into `K` and
    /// remove the entry, never re-broadcasting.
    pub(crate) fn apply_wire(&self, wire: WireKey) -> BoxFuture<'static, Result<()>> {
        let cache = self.inner.cache.clone();
        Box::pin(async move {
            let key = K::from_wire(&wire)?;
            cache.invalidate(&key).await;
            Ok(())
        })
    }
}
