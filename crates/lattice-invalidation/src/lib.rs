//! Cross-instance cache invalidation.
//!
//! When one instance invalidates a key, every other instance sharing the
//! backing store must drop its own copy. This crate carries that signal:
//! the [`InvalidationPublisher`] broadcasts "this key is stale" messages on
//! the shared notification channel, the [`NotificationListener`] runs as a
//! resilient background task on every instance, and the
//! [`NotificationDispatcher`] applies received messages to the local
//! registry. The [`SelfOriginSuppressor`] keeps an instance from reacting
//! to its own broadcasts, breaking the propagation cycle.
//!
//! [`InvalidationService`] ties the pieces to the process lifecycle:
//!
//! ```ignore
//! let registry = Arc::new(CacheRegistry::new());
//! let channel = Arc::new(PgChannel::new(pool));
//! let mut service =
//!     InvalidationService::new(registry.clone(), channel, InvalidationConfig::default());
//! service.startup();
//! // ... serve traffic ...
//! service.shutdown().await;
//! ```

pub mod channel;
pub mod dispatcher;
pub mod listener;
pub mod memory;
pub mod publisher;
pub mod service;
pub mod suppressor;

pub use channel::{ChannelError, Envelope, NotificationChannel, NotificationSubscription};
pub use dispatcher::{DispatchOutcome, NotificationDispatcher};
pub use listener::{ListenerState, NotificationListener};
pub use memory::{MemoryBus, MemoryChannel};
pub use publisher::InvalidationPublisher;
pub use service::{InvalidationConfig, InvalidationService};
pub use suppressor::SelfOriginSuppressor;
