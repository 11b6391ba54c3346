use async_trait::async_trait;
use thiserror::Error;

use lattice_core::SessionTag;

/// One message as it arrives off the transport: the sender's session tag
/// (attached by the channel, not the payload) plus the raw payload.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub sender: SessionTag,
    pub payload: String,
}

/// Transport-level errors. Never fatal to the process: the publisher logs
/// and drops, the listener re-enters its connect loop.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to connect to the notification channel: {0}")]
    Connect(String),

    #[error("Failed to publish notification: {0}")]
    Publish(String),

    #[error("Notification subscription lost: {0}")]
    Subscription(String),

    #[error("Notification channel is closed")]
    Closed,
}

/// The shared notification channel between instances.
///
/// Implemented over the backing store's native publish/subscribe primitive
/// (LISTEN/NOTIFY for PostgreSQL) and over an in-process bus for embedded
/// deployments and tests.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// The session tag of the publishing connection, establishing that
    /// connection if necessary. The tag changes whenever the connection is
    /// re-established.
    async fn session(&self) -> Result<SessionTag, ChannelError>;

    /// Send one payload on the shared channel. No retry, no acknowledgment
    /// beyond the transport's own write.
    async fn send(&self, payload: &str) -> Result<(), ChannelError>;

    /// Open a fresh subscription to the shared channel.
    async fn subscribe(&self) -> Result<Box<dyn NotificationSubscription>, ChannelError>;
}

/// An open subscription, polled by the listener loop.
#[async_trait]
pub trait NotificationSubscription: Send {
    /// Wait for the next message. An `Err` means the subscription is broken
    /// and must be reopened.
    async fn recv(&mut self) -> Result<Envelope, ChannelError>;
}
