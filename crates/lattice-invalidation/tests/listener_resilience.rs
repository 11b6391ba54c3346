//! The listener must survive repeated connection failures: given a channel
//! that refuses N subscriptions before accepting one, it reaches Listening
//! after at most N backoff cycles and then processes messages normally.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use lattice_cache::{CachePolicy, CacheRegistry};
use lattice_core::{InvalidationMessage, SessionTag, WireKey};
use lattice_invalidation::{
    ChannelError, Envelope, ListenerState, MemoryBus, NotificationChannel,
    NotificationDispatcher, NotificationListener, NotificationSubscription,
    SelfOriginSuppressor,
};

/// Wraps a working channel but refuses the first N subscription attempts.
struct FlakyChannel {
    inner: Arc<dyn NotificationChannel>,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyChannel {
    fn new(inner: Arc<dyn NotificationChannel>, failures: usize) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NotificationChannel for FlakyChannel {
    async fn session(&self) -> Result<SessionTag, ChannelError> {
        self.inner.session().await
    }

    async fn send(&self, payload: &str) -> Result<(), ChannelError> {
        self.inner.send(payload).await
    }

    async fn subscribe(&self) -> Result<Box<dyn NotificationSubscription>, ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if refused {
            return Err(ChannelError::Connect("simulated outage".into()));
        }
        self.inner.subscribe().await
    }
}

#[tokio::test]
async fn listener_reaches_listening_after_n_failed_connects() {
    let bus = MemoryBus::new();
    let flaky = Arc::new(FlakyChannel::new(Arc::new(bus.endpoint()), 4));

    let registry = Arc::new(CacheRegistry::new());
    let handle = registry
        .register::<String, String>("widget", CachePolicy::new())
        .unwrap();
    handle.insert("7".into(), "Hello".into()).await;

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&registry),
        Arc::new(SelfOriginSuppressor::new()),
    ));
    let listener = Arc::new(
        NotificationListener::new(Arc::clone(&flaky) as Arc<dyn NotificationChannel>, dispatcher)
            .with_reconnect_delay(Duration::from_millis(10)),
    );
    let mut state = listener.state();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = Arc::clone(&listener).start(shutdown_rx);

    tokio::time::timeout(
        Duration::from_secs(2),
        state.wait_for(|s| *s == ListenerState::Listening),
    )
    .await
    .expect("listener never recovered from the simulated outage")
    .unwrap();
    assert_eq!(flaky.attempts.load(Ordering::SeqCst), 5);

    // Once listening, messages flow normally.
    let remote = bus.endpoint();
    let payload = InvalidationMessage::new("widget", &WireKey::Text("7".into()))
        .encode()
        .unwrap();
    remote.send(&payload).await.unwrap();

    let mut absent = false;
    for _ in 0..100 {
        if handle.get(&"7".to_string()).await.is_none() {
            absent = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(absent, "message after recovery was not applied");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("listener ignored the stop request")
        .unwrap();
    assert_eq!(*state.borrow(), ListenerState::Stopped);
}

#[tokio::test]
async fn stop_request_interrupts_the_connect_retry_loop() {
    // A channel that never connects: the stop signal must still win.
    let bus = MemoryBus::new();
    let flaky = Arc::new(FlakyChannel::new(Arc::new(bus.endpoint()), usize::MAX));

    let registry = Arc::new(CacheRegistry::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        registry,
        Arc::new(SelfOriginSuppressor::new()),
    ));
    let listener = Arc::new(
        NotificationListener::new(flaky as Arc<dyn NotificationChannel>, dispatcher)
            .with_reconnect_delay(Duration::from_secs(60)),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = Arc::clone(&listener).start(shutdown_rx);
    tokio::time::sleep(Duration::from_millis(20)).await;

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("listener kept retrying past the stop request")
        .unwrap();
}

#[tokio::test]
async fn dropped_shutdown_sender_stops_the_listener() {
    let bus = MemoryBus::new();
    let channel: Arc<dyn NotificationChannel> = Arc::new(bus.endpoint());
    let registry = Arc::new(CacheRegistry::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        registry,
        Arc::new(SelfOriginSuppressor::new()),
    ));
    let listener = Arc::new(NotificationListener::new(channel, dispatcher));
    let mut state = listener.state();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = Arc::clone(&listener).start(shutdown_rx);
    tokio::time::timeout(
        Duration::from_secs(2),
        state.wait_for(|s| *s == ListenerState::Listening),
    )
    .await
    .unwrap()
    .unwrap();

    drop(shutdown_tx);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("listener outlived its owner")
        .unwrap();
}
