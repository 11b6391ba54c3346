use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::BoxFuture;
use tracing::info;

use lattice_core::{CacheError, CacheKey, Result, WireKey};

use crate::handle::{CacheHandle, Loader, SinkCell};
use crate::policy::CachePolicy;
use crate::sink::InvalidationSink;

/// Type-erased registration record: the typed handle for downcasting plus a
/// closure that decodes a wire key and invalidates locally.
struct Registered {
    handle: Box<dyn Any + Send + Sync>,
    apply: Box<dyn Fn(WireKey) -> BoxFuture<'static, Result<()>> + Send + Sync>,
}

/// Process-wide registry of named caches.
///
/// Constructed once at startup and passed by `Arc` to every component that
/// needs cache access; there is deliberately no global instance. Each cache
/// is registered exactly once, during startup, and lives for the life of
/// the process.
pub struct CacheRegistry {
    caches: DashMap<String, Registered>,
    sink: Arc<SinkCell>,
}

impl CacheRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            caches: DashMap::new(),
            sink: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Register a non-loading cache. Misses read as absent.
    ///
    /// Fails with [`CacheError::Configuration`] if the name is taken.
    pub fn register<K, V>(&self, name: &str, policy: CachePolicy) -> Result<CacheHandle<K, V>>
    where
        K: CacheKey,
        V: Clone + Send + Sync + 'static,
    {
        self.register_inner(name, &policy, None)
    }

    /// Register a loading cache: a miss runs `loader`, with concurrent
    /// misses for the same key coalesced onto one invocation.
    pub fn register_loading<K, V, F, Fut>(
        &self,
        name: &str,
        policy: CachePolicy,
        loader: F,
    ) -> Result<CacheHandle<K, V>>
    where
        K: CacheKey,
        V: Clone + Send + Sync + 'static,
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let loader: Loader<K, V> =
            Arc::new(move |key| Box::pin(loader(key)) as BoxFuture<'static, anyhow::Result<V>>);
        self.register_inner(name, &policy, Some(loader))
    }

    fn register_inner<K, V>(
        &self,
        name: &str,
        policy: &CachePolicy,
        loader: Option<Loader<K, V>>,
    ) -> Result<CacheHandle<K, V>>
    where
        K: CacheKey,
        V: Clone + Send + Sync + 'static,
    {
        match self.caches.entry(name.to_string()) {
            Entry::Occupied(_) => Err(CacheError::configuration(format!(
                "cache '{name}' is already registered"
            ))),
            Entry::Vacant(slot) => {
                let handle = CacheHandle::<K, V>::new(name, policy, loader, Arc::clone(&self.sink));
                let applier = handle.clone();
                slot.insert(Registered {
                    handle: Box::new(handle.clone()),
                    apply: Box::new(move |wire| applier.apply_wire(wire)),
                });
                info!(cache = name, max_entries = ?policy.max_entries(), "Registered cache");
                Ok(handle)
            }
        }
    }

    /// Fetch the typed handle for a registered cache.
    ///
    /// Fails with [`CacheError::NotFound`] for an unknown name, and with
    /// [`CacheError::Configuration`] when the cache was registered under
    /// different key/value types.
    pub fn handle<K, V>(&self, name: &str) -> Result<CacheHandle<K, V>>
    where
        K: CacheKey,
        V: Clone + Send + Sync + 'static,
    {
        let entry = self
            .caches
            .get(name)
            .ok_or_else(|| CacheError::not_found(name))?;
        entry
            .handle
            .downcast_ref::<CacheHandle<K, V>>()
            .cloned()
            .ok_or_else(|| {
                CacheError::configuration(format!(
                    "cache '{name}' was registered with different key/value types"
                ))
            })
    }

    /// Apply an invalidation received from another instance: decode the wire
    /// key for the named cache and remove the entry. Never re-broadcasts.
    pub async fn apply_remote(&self, name: &str, key: WireKey) -> Result<()> {
        let apply = {
            let entry = self
                .caches
                .get(name)
                .ok_or_else(|| CacheError::not_found(name))?;
            (entry.apply)(key)
        };
        apply.await
    }

    /// Wire in the broadcast sink. Called once by the invalidation layer
    /// during startup; until then (and in processes that never call it,
    /// e.g. one-shot batch jobs) propagation is a no-op.
    pub fn set_sink(&self, sink: Box<dyn InvalidationSink>) {
        self.sink.store(Some(Arc::new(sink)));
    }

    /// Detach the broadcast sink; subsequent propagation is a no-op.
    pub fn clear_sink(&self) {
        self.sink.store(None);
    }

    /// Whether a cache with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Number of registered caches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}
