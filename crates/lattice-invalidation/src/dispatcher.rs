use std::sync::Arc;

use tracing::{debug, trace, warn};

use lattice_cache::CacheRegistry;
use lattice_core::{CacheError, InvalidationMessage};

use crate::channel::Envelope;
use crate::suppressor::SelfOriginSuppressor;

/// What happened to one received notification. Everything except `Applied`
/// means the message was dropped; none of these tear down the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The local entry was invalidated.
    Applied,
    /// Echo of a message this process sent; ignored.
    SelfOrigin,
    /// The payload or key literal did not decode.
    Malformed,
    /// No cache with that name is registered locally.
    UnknownCache,
}

/// Applies received invalidation messages to the local cache registry.
pub struct NotificationDispatcher {
    registry: Arc<CacheRegistry>,
    suppressor: Arc<SelfOriginSuppressor>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(registry: Arc<CacheRegistry>, suppressor: Arc<SelfOriginSuppressor>) -> Self {
        Self {
            registry,
            suppressor,
        }
    }

    /// Handle one message. Infallible by design: per-message problems are
    /// logged and reported in the outcome, never raised, so one bad message
    /// can never stop the listener loop. Applied invalidations are local
    /// only; there is no re-broadcast, which is what breaks the cycle.
    pub async fn handle(&self, envelope: &Envelope) -> DispatchOutcome {
        if self.suppressor.is_self(envelope.sender) {
            trace!(session = %envelope.sender, "Ignoring echo of own invalidation");
            return DispatchOutcome::SelfOrigin;
        }

        let message = match InvalidationMessage::from_json(&envelope.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, payload = %envelope.payload, "Dropping malformed invalidation");
                return DispatchOutcome::Malformed;
            }
        };

        let key = match message.decode_key() {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, cache = %message.cache, "Dropping invalidation with undecodable key");
                return DispatchOutcome::Malformed;
            }
        };

        match self.registry.apply_remote(&message.cache, key).await {
            Ok(()) => {
                debug!(cache = %message.cache, key = %message.key, "Invalidated entry from remote notification");
                DispatchOutcome::Applied
            }
            Err(CacheError::NotFound(_)) => {
                warn!(cache = %message.cache, "Invalidation for a cache not registered here");
                DispatchOutcome::UnknownCache
            }
            Err(e) => {
                warn!(error = %e, cache = %message.cache, "Dropping invalidation the local cache rejected");
                DispatchOutcome::Malformed
            }
        }
    }
}
