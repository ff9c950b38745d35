use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Notify, OnceCell};

use super::{dead_letter_queue, Message};

#[derive(Debug, Error)]
pub enum MqError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("message codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Queue transport. Queues are FIFO; `receive` takes from the first
/// non-empty queue in `queues` order.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, queue: &str, message: &Message) -> Result<(), MqError>;

    /// Waits up to `timeout` for a message on any of `queues`.
    async fn receive(
        &self,
        queues: &[String],
        timeout: Duration,
    ) -> Result<Option<(String, Message)>, MqError>;
}

/// Redis lists as queues: `LPUSH` to publish, `BRPOP` to receive.
///
/// Publishing shares one multiplexed connection. A blocking `BRPOP` would
/// stall that connection, so receivers check a connection out of a small
/// pool and hand it back afterwards, which leaves one connection per worker.
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
    publisher: Arc<OnceCell<MultiplexedConnection>>,
    receivers: Arc<Mutex<Vec<MultiplexedConnection>>>,
}

impl RedisBroker {
    pub fn new(redis_url: &str) -> Result<Self, MqError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            publisher: Arc::new(OnceCell::new()),
            receivers: Arc::new(Mutex::new(Vec::new())),
        })
    }

    async fn publisher(&self) -> Result<MultiplexedConnection, MqError> {
        let conn = self
            .publisher
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await?;
        Ok(conn.clone())
    }

    async fn checkout_receiver(&self) -> Result<MultiplexedConnection, MqError> {
        let pooled = self
            .receivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
        match pooled {
            Some(conn) => Ok(conn),
            None => Ok(self.client.get_multiplexed_async_connection().await?),
        }
    }

    fn checkin_receiver(&self, conn: MultiplexedConnection) {
        self.receivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(conn);
    }

    /// Moves a payload that is not a `Message` to the queue's dead-letter list.
    async fn dead_letter(
        &self,
        queue: &str,
        payload: String,
        error: serde_json::Error,
    ) -> Result<(), MqError> {
        let dlq = dead_letter_queue(queue);
        tracing::warn!(
            queue = %queue,
            dead_letter_queue = %dlq,
            error = %error,
            payload = %payload,
            "undecodable message"
        );

        let mut conn = self.publisher().await?;
        let _: () = conn.lpush(&dlq, payload).await?;
        Ok(())
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, queue: &str, message: &Message) -> Result<(), MqError> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.publisher().await?;
        let _: () = conn.lpush(queue, payload).await?;

        tracing::debug!(queue = %queue, message_id = %message.id, "published");
        Ok(())
    }

    async fn receive(
        &self,
        queues: &[String],
        timeout: Duration,
    ) -> Result<Option<(String, Message)>, MqError> {
        if queues.is_empty() {
            tokio::time::sleep(timeout).await;
            return Ok(None);
        }

        let mut conn = self.checkout_receiver().await?;
        // A failed connection is dropped rather than returned to the pool.
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(queues)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        self.checkin_receiver(conn);

        let Some((queue, payload)) = popped else {
            return Ok(None);
        };
        match decode(&payload) {
            Ok(message) => Ok(Some((queue, message))),
            Err(error) => {
                self.dead_letter(&queue, payload, error).await?;
                Ok(None)
            }
        }
    }
}

fn decode(payload: &str) -> Result<Message, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Process-local broker for tests and single-process runs.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<Mutex<HashMap<String, VecDeque<Message>>>>,
    notify: Arc<Notify>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting on `queue`.
    pub fn pending(&self, queue: &str) -> usize {
        self.lock().get(queue).map(VecDeque::len).unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Message>>> {
        // a poisoned map is still structurally valid
        self.queues.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pop_first(&self, queues: &[String]) -> Option<(String, Message)> {
        let mut map = self.lock();
        queues.iter().find_map(|queue| {
            map.get_mut(queue)
                .and_then(VecDeque::pop_front)
                .map(|message| (queue.clone(), message))
        })
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, queue: &str, message: &Message) -> Result<(), MqError> {
        self.lock()
            .entry(queue.to_string())
            .or_default()
            .push_back(message.clone());
        self.notify.notify_waiters();
        Ok(())
    }

    async fn receive(
        &self,
        queues: &[String],
        timeout: Duration,
    ) -> Result<Option<(String, Message)>, MqError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(found) = self.pop_first(queues) {
                return Ok(Some(found));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}
