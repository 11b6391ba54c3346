//! In-process notification bus.
//!
//! Every [`MemoryChannel`] endpoint attached to the same [`MemoryBus`]
//! behaves like a separate instance with its own session tag, which makes
//! cross-instance behavior testable without a database. It also serves
//! single-process deployments where broadcasts only need to loop back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use lattice_core::SessionTag;

use crate::channel::{ChannelError, Envelope, NotificationChannel, NotificationSubscription};

const BUS_CAPACITY: usize = 256;

/// Shared in-process bus; create endpoints with [`MemoryBus::endpoint`].
pub struct MemoryBus {
    sender: broadcast::Sender<Envelope>,
    // Keeps the channel open while no subscription exists, so sends to an
    // idle bus are dropped rather than errored.
    _keepalive: std::sync::Mutex<broadcast::Receiver<Envelope>>,
    next_tag: AtomicU32,
    published: AtomicU64,
}

impl MemoryBus {
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (sender, keepalive) = broadcast::channel(BUS_CAPACITY);
        Arc::new(Self {
            sender,
            _keepalive: std::sync::Mutex::new(keepalive),
            next_tag: AtomicU32::new(1),
            published: AtomicU64::new(0),
        })
    }

    /// Attach a new endpoint with a fresh session tag.
    #[must_use]
    pub fn endpoint(self: &Arc<Self>) -> MemoryChannel {
        let tag = SessionTag::new(self.next_tag.fetch_add(1, Ordering::Relaxed));
        MemoryChannel {
            bus: Arc::clone(self),
            tag,
        }
    }

    /// Total number of messages ever published on this bus.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// One instance's connection to a [`MemoryBus`].
pub struct MemoryChannel {
    bus: Arc<MemoryBus>,
    tag: SessionTag,
}

#[async_trait]
impl NotificationChannel for MemoryChannel {
    async fn session(&self) -> Result<SessionTag, ChannelError> {
        Ok(self.tag)
    }

    async fn send(&self, payload: &str) -> Result<(), ChannelError> {
        self.bus.published.fetch_add(1, Ordering::Relaxed);
        self.bus
            .sender
            .send(Envelope {
                sender: self.tag,
                payload: payload.to_string(),
            })
            .map_err(|_| ChannelError::Closed)?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn NotificationSubscription>, ChannelError> {
        Ok(Box::new(MemorySubscription {
            receiver: self.bus.sender.subscribe(),
        }))
    }
}

struct MemorySubscription {
    receiver: broadcast::Receiver<Envelope>,
}

#[async_trait]
impl NotificationSubscription for MemorySubscription {
    async fn recv(&mut self) -> Result<Envelope, ChannelError> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Ok(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Memory bus subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(ChannelError::Closed),
            }
        }
    }
}
