use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lattice_cache::CacheRegistry;

use crate::channel::NotificationChannel;
use crate::dispatcher::NotificationDispatcher;
use crate::listener::{DEFAULT_RECONNECT_DELAY, ListenerState, NotificationListener};
use crate::publisher::InvalidationPublisher;
use crate::suppressor::SelfOriginSuppressor;

/// Tunables for the invalidation service.
#[derive(Debug, Clone)]
pub struct InvalidationConfig {
    /// When `false` (one-shot batch processes), no listener is started and
    /// publishing is a no-op; local invalidation still works.
    pub enabled: bool,
    /// Fixed backoff between listener reconnection attempts.
    pub reconnect_delay: Duration,
    /// How long `shutdown` waits for the listener before abandoning it.
    pub shutdown_grace: Duration,
    /// How long a self-originated session tag stays suppressed.
    pub suppression_window: Duration,
    /// Maximum number of suppressed tags held at once.
    pub suppression_capacity: usize,
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            shutdown_grace: Duration::from_secs(5),
            suppression_window: Duration::from_secs(120),
            suppression_capacity: 64,
        }
    }
}

/// Owns the moving parts of cross-instance invalidation and ties them to
/// the process lifecycle.
///
/// Constructed once at startup and held by the application context; there
/// is no global instance. `startup` must run before any cache consumer,
/// `shutdown` during graceful termination.
pub struct InvalidationService {
    registry: Arc<CacheRegistry>,
    channel: Arc<dyn NotificationChannel>,
    suppressor: Arc<SelfOriginSuppressor>,
    config: InvalidationConfig,
    shutdown: watch::Sender<bool>,
    listener: Option<Arc<NotificationListener>>,
    task: Option<JoinHandle<()>>,
}

impl InvalidationService {
    #[must_use]
    pub fn new(
        registry: Arc<CacheRegistry>,
        channel: Arc<dyn NotificationChannel>,
        config: InvalidationConfig,
    ) -> Self {
        let suppressor = Arc::new(SelfOriginSuppressor::with_policy(
            config.suppression_window,
            config.suppression_capacity,
        ));
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            channel,
            suppressor,
            config,
            shutdown,
            listener: None,
            task: None,
        }
    }

    /// The registry this service propagates for.
    #[must_use]
    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    /// Lifecycle state of the background listener, when one is running.
    #[must_use]
    pub fn listener_state(&self) -> Option<watch::Receiver<ListenerState>> {
        self.listener.as_ref().map(|listener| listener.state())
    }

    /// Wire the publisher into the registry and start the background
    /// listener. Idempotent; a second call does nothing.
    pub fn startup(&mut self) {
        if self.task.is_some() {
            debug!("Invalidation service already started");
            return;
        }
        if !self.config.enabled {
            info!("Cache invalidation propagation disabled for this process");
            return;
        }

        // A previous shutdown leaves the stop flag raised; lower it so a
        // restarted listener does not exit immediately.
        self.shutdown.send_replace(false);

        self.registry.set_sink(Box::new(InvalidationPublisher::new(
            Arc::clone(&self.channel),
            Arc::clone(&self.suppressor),
        )));

        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.suppressor),
        ));
        let listener = Arc::new(
            NotificationListener::new(Arc::clone(&self.channel), dispatcher)
                .with_reconnect_delay(self.config.reconnect_delay),
        );
        self.task = Some(Arc::clone(&listener).start(self.shutdown.subscribe()));
        self.listener = Some(listener);
        info!("Invalidation service started");
    }

    /// Request the listener to stop and wait up to the configured grace
    /// period. A listener that does not stop in time is abandoned so
    /// process shutdown is never blocked indefinitely.
    pub async fn shutdown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.listener = None;
        self.registry.clear_sink();
        let _ = self.shutdown.send(true);

        let abort = task.abort_handle();
        match tokio::time::timeout(self.config.shutdown_grace, task).await {
            Ok(_) => info!("Invalidation service stopped"),
            Err(_) => {
                warn!(
                    grace_ms = self.config.shutdown_grace.as_millis() as u64,
                    "Invalidation listener did not stop within the grace period, aborting"
                );
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lattice_cache::CachePolicy;
    use crate::memory::MemoryBus;

    #[tokio::test]
    async fn test_startup_is_idempotent_and_shutdown_completes() {
        let registry = Arc::new(CacheRegistry::new());
        let bus = MemoryBus::new();
        let mut service = InvalidationService::new(
            Arc::clone(&registry),
            Arc::new(bus.endpoint()),
            InvalidationConfig::default(),
        );

        service.startup();
        service.startup();
        assert!(service.listener_state().is_some());

        service.shutdown().await;
        assert!(service.listener_state().is_none());
        // Shutting down twice is harmless.
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_service_neither_listens_nor_publishes() {
        let registry = Arc::new(CacheRegistry::new());
        let bus = MemoryBus::new();
        let mut service = InvalidationService::new(
            Arc::clone(&registry),
            Arc::new(bus.endpoint()),
            InvalidationConfig {
                enabled: false,
                ..InvalidationConfig::default()
            },
        );
        service.startup();
        assert!(service.listener_state().is_none());

        let handle = registry
            .register::<i64, String>("widget", CachePolicy::new())
            .unwrap();
        handle.insert(7, "Hello".into()).await;
        // Propagation requested but administratively disabled: local removal
        // happens, nothing crosses the wire.
        handle.invalidate(&7, true).await.unwrap();
        assert_eq!(handle.get(&7).await, None);
        assert_eq!(bus.published(), 0);
    }
}
