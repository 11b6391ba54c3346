use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use lattice_cache::InvalidationSink;
use lattice_core::{InvalidationMessage, Result, WireKey};

use crate::channel::NotificationChannel;
use crate::suppressor::SelfOriginSuppressor;

/// Broadcasts local invalidations on the shared notification channel.
///
/// One network round trip per call, no retry: a failed publish is logged
/// and dropped, because the worst case is a stale remote entry that
/// self-heals on the next write to that key or its own time-bound expiry.
pub struct InvalidationPublisher {
    channel: Arc<dyn NotificationChannel>,
    suppressor: Arc<SelfOriginSuppressor>,
}

impl InvalidationPublisher {
    #[must_use]
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        suppressor: Arc<SelfOriginSuppressor>,
    ) -> Self {
        Self {
            channel,
            suppressor,
        }
    }
}

#[async_trait]
impl InvalidationSink for InvalidationPublisher {
    async fn publish(&self, cache: &str, key: WireKey) -> Result<()> {
        // Encode-class failures surface to the invalidate caller; the local
        // removal has already happened by now.
        let payload = InvalidationMessage::new(cache, &key).encode()?;

        let tag = match self.channel.session().await {
            Ok(tag) => tag,
            Err(e) => {
                warn!(cache, error = %e, "Invalidation broadcast skipped: channel unavailable");
                return Ok(());
            }
        };

        // Mark before transmitting, so the echo of this very message is
        // already recognizable when it comes back.
        self.suppressor.mark(tag);

        match self.channel.send(&payload).await {
            Ok(()) => debug!(cache, session = %tag, "Broadcast invalidation"),
            Err(e) => warn!(cache, error = %e, "Invalidation broadcast dropped"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lattice_core::{CacheError, SessionTag};

    use crate::channel::{ChannelError, Envelope, NotificationSubscription};
    use crate::memory::MemoryBus;

    /// Channel that asserts the suppressor already knows the session tag at
    /// send time, i.e. `mark` happened before the transmit.
    struct OrderProbe {
        tag: SessionTag,
        suppressor: Arc<SelfOriginSuppressor>,
    }

    #[async_trait]
    impl NotificationChannel for OrderProbe {
        async fn session(&self) -> std::result::Result<SessionTag, ChannelError> {
            Ok(self.tag)
        }

        async fn send(&self, _payload: &str) -> std::result::Result<(), ChannelError> {
            assert!(
                self.suppressor.is_self(self.tag),
                "send happened before mark"
            );
            Ok(())
        }

        async fn subscribe(
            &self,
        ) -> std::result::Result<Box<dyn NotificationSubscription>, ChannelError> {
            Err(ChannelError::Connect("probe has no subscriptions".into()))
        }
    }

    #[tokio::test]
    async fn test_marks_own_session_before_sending() {
        let suppressor = Arc::new(SelfOriginSuppressor::new());
        let probe = Arc::new(OrderProbe {
            tag: SessionTag::new(42),
            suppressor: Arc::clone(&suppressor),
        });
        let publisher = InvalidationPublisher::new(probe, Arc::clone(&suppressor));

        publisher
            .publish("widget", WireKey::Int64(7))
            .await
            .unwrap();
        assert!(suppressor.is_self(SessionTag::new(42)));
    }

    #[tokio::test]
    async fn test_publishes_the_wire_message() {
        let bus = MemoryBus::new();
        let suppressor = Arc::new(SelfOriginSuppressor::new());
        let publisher =
            InvalidationPublisher::new(Arc::new(bus.endpoint()), Arc::clone(&suppressor));

        let receiver = bus.endpoint();
        let mut subscription = receiver.subscribe().await.unwrap();

        publisher
            .publish("widget", WireKey::Text("7".into()))
            .await
            .unwrap();

        let Envelope { payload, .. } = subscription.recv().await.unwrap();
        let message = InvalidationMessage::from_json(&payload).unwrap();
        assert_eq!(message.cache, "widget");
        assert_eq!(message.decode_key().unwrap(), WireKey::Text("7".into()));
    }

    #[tokio::test]
    async fn test_oversized_key_surfaces_to_the_caller() {
        let bus = MemoryBus::new();
        let suppressor = Arc::new(SelfOriginSuppressor::new());
        let publisher =
            InvalidationPublisher::new(Arc::new(bus.endpoint()), Arc::clone(&suppressor));

        let err = publisher
            .publish("widget", WireKey::Text("x".repeat(10_000)))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::PayloadTooLarge(_)));
        assert_eq!(bus.published(), 0);
    }
}
