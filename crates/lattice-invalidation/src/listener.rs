use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, trace, warn};

use crate::channel::NotificationChannel;
use crate::dispatcher::NotificationDispatcher;

/// Delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Where the listener currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not running: initial and terminal.
    Stopped,
    /// Opening a subscription, retrying with backoff on failure.
    Connecting,
    /// Subscribed and polling for messages.
    Listening,
}

/// The single dedicated background task that receives invalidations.
///
/// Started once at process startup, stopped cooperatively at shutdown.
/// The connect loop retries forever: repeated transient connectivity
/// failures must never permanently kill the task. Per-message failures are
/// absorbed by the dispatcher; only a broken subscription sends the loop
/// back to `Connecting`.
pub struct NotificationListener {
    channel: Arc<dyn NotificationChannel>,
    dispatcher: Arc<NotificationDispatcher>,
    reconnect_delay: Duration,
    state: watch::Sender<ListenerState>,
}

impl NotificationListener {
    #[must_use]
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Stopped);
        Self {
            channel,
            dispatcher,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            state,
        }
    }

    /// Override the fixed reconnect backoff.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Observe the listener's lifecycle state.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Spawn the listener task. It runs until `shutdown` flips to `true`
    /// (or its sender is dropped), observing the signal at every await
    /// point, so a stop request is seen within one polling round.
    pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!("Starting cache invalidation listener");
        tokio::spawn(async move {
            self.run(shutdown).await;
            let _ = self.state.send(ListenerState::Stopped);
            info!("Cache invalidation listener stopped");
        })
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let _ = self.state.send(ListenerState::Connecting);

            let mut subscription = tokio::select! {
                biased;
                () = stop_requested(&mut shutdown) => return,
                opened = self.channel.subscribe() => match opened {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        warn!(
                            error = %e,
                            delay_ms = self.reconnect_delay.as_millis() as u64,
                            "Failed to open invalidation subscription, will retry"
                        );
                        tokio::select! {
                            biased;
                            () = stop_requested(&mut shutdown) => return,
                            () = sleep(self.reconnect_delay) => {}
                        }
                        continue;
                    }
                },
            };

            let _ = self.state.send(ListenerState::Listening);
            info!("Listening for cache invalidations");

            loop {
                tokio::select! {
                    biased;
                    () = stop_requested(&mut shutdown) => return,
                    received = subscription.recv() => match received {
                        Ok(envelope) => {
                            // A message is either fully handled or fully
                            // dropped; the dispatcher never raises.
                            let outcome = self.dispatcher.handle(&envelope).await;
                            trace!(?outcome, "Handled invalidation notification");
                        }
                        Err(e) => {
                            warn!(error = %e, "Invalidation subscription lost, reconnecting");
                            break;
                        }
                    },
                }
            }

            // Pause before reconnecting so a flapping connection cannot spin.
            tokio::select! {
                biased;
                () = stop_requested(&mut shutdown) => return,
                () = sleep(self.reconnect_delay) => {}
            }
        }
    }
}

/// Resolves once a stop has been requested. A dropped sender counts as a
/// stop request: it means the owning service is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
