use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgConnection, PgListener, PgPool};
use tokio::sync::Mutex;
use tracing::debug;

use lattice_core::{INVALIDATION_CHANNEL, SessionTag};
use lattice_invalidation::{
    ChannelError, Envelope, NotificationChannel, NotificationSubscription,
};

/// The shared notification channel over PostgreSQL LISTEN/NOTIFY.
///
/// Publishing uses one dedicated connection, detached from the pool and
/// opened lazily on first use: the connection's backend pid is the session
/// tag Postgres attaches to every notification it emits, so it must stay
/// stable between publishes. A failed send drops the connection; the next
/// publish reconnects and gets a fresh tag.
pub struct PgChannel {
    pool: PgPool,
    publisher: Mutex<Option<PublishConnection>>,
}

struct PublishConnection {
    conn: PgConnection,
    tag: SessionTag,
}

impl PgChannel {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            publisher: Mutex::new(None),
        }
    }

    async fn ensure_publisher<'a>(
        pool: &PgPool,
        slot: &'a mut Option<PublishConnection>,
    ) -> Result<&'a mut PublishConnection, ChannelError> {
        if let Some(publisher) = slot {
            return Ok(publisher);
        }

        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?
            .detach();
        let pid: i32 = query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut conn)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        debug!(backend_pid = pid, "Opened invalidation publish connection");

        Ok(slot.insert(PublishConnection {
            conn,
            tag: SessionTag::from_backend_pid(pid),
        }))
    }
}

#[async_trait]
impl NotificationChannel for PgChannel {
    async fn session(&self) -> Result<SessionTag, ChannelError> {
        let mut slot = self.publisher.lock().await;
        let publisher = Self::ensure_publisher(&self.pool, &mut slot).await?;
        Ok(publisher.tag)
    }

    async fn send(&self, payload: &str) -> Result<(), ChannelError> {
        let mut slot = self.publisher.lock().await;
        let publisher = Self::ensure_publisher(&self.pool, &mut slot).await?;

        let sent = query("SELECT pg_notify($1, $2)")
            .bind(INVALIDATION_CHANNEL)
            .bind(payload)
            .execute(&mut publisher.conn)
            .await;

        if let Err(e) = sent {
            // Next publish reconnects under a new session tag.
            *slot = None;
            return Err(ChannelError::Publish(e.to_string()));
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn NotificationSubscription>, ChannelError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        listener
            .listen(INVALIDATION_CHANNEL)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        debug!(channel = INVALIDATION_CHANNEL, "Subscribed to invalidation channel");
        Ok(Box::new(PgSubscription { listener }))
    }
}

struct PgSubscription {
    listener: PgListener,
}

#[async_trait]
impl NotificationSubscription for PgSubscription {
    async fn recv(&mut self) -> Result<Envelope, ChannelError> {
        let notification = self
            .listener
            .recv()
            .await
            .map_err(|e| ChannelError::Subscription(e.to_string()))?;
        Ok(Envelope {
            sender: SessionTag::new(notification.process_id()),
            payload: notification.payload().to_string(),
        })
    }
}
