use std::time::{Duration, Instant};

use dashmap::DashMap;

use lattice_core::SessionTag;

/// How long a marked tag stays suppressed. Only in-flight messages need
/// suppression, so the window stays short.
const DEFAULT_WINDOW: Duration = Duration::from_secs(120);

/// Maximum number of tags held at once.
const DEFAULT_CAPACITY: usize = 64;

/// Short-lived record of "session tags this process itself published under".
///
/// The publisher marks its current tag before every broadcast; the
/// dispatcher checks incoming tags against it and drops echoes. Entries
/// expire after a bounded window and the map is size-capped, so this is a
/// best-effort optimization: a missed suppression means one redundant local
/// invalidation of an already-absent key, which is harmless. Readers and
/// writers need no external locking.
pub struct SelfOriginSuppressor {
    tags: DashMap<SessionTag, Instant>,
    window: Duration,
    capacity: usize,
}

impl SelfOriginSuppressor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(DEFAULT_WINDOW, DEFAULT_CAPACITY)
    }

    /// Build with an explicit suppression window and tag capacity.
    #[must_use]
    pub fn with_policy(window: Duration, capacity: usize) -> Self {
        Self {
            tags: DashMap::new(),
            window,
            capacity,
        }
    }

    /// Record that messages tagged `tag` originate from this process.
    /// Re-marking an already-known tag restarts its window.
    pub fn mark(&self, tag: SessionTag) {
        if self.tags.len() >= self.capacity {
            self.prune();
        }
        self.tags.insert(tag, Instant::now());
    }

    /// Whether `tag` was marked by this process within the window.
    pub fn is_self(&self, tag: SessionTag) -> bool {
        let fresh = self.tags.get(&tag).map(|at| at.elapsed() <= self.window);
        match fresh {
            Some(true) => true,
            Some(false) => {
                self.tags.remove(&tag);
                false
            }
            None => false,
        }
    }

    /// Number of tags currently held (fresh or not yet swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    fn prune(&self) {
        self.tags.retain(|_, at| at.elapsed() <= self.window);
        // Still full: drop the oldest tags. Suppression stays best-effort.
        while self.tags.len() >= self.capacity {
            let oldest = self
                .tags
                .iter()
                .min_by_key(|entry| *entry.value())
                .map(|entry| *entry.key());
            match oldest {
                Some(tag) => {
                    self.tags.remove(&tag);
                }
                None => break,
            }
        }
    }
}

impl Default for SelfOriginSuppressor {
    fn default() -> Self {
        Self::new()
    }
}
