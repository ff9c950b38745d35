use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{inbound_queue, unique_reply_queue, Broker, Message, MqError};
use crate::auth::Credentials;
use crate::domain::Filter;

/// Request/reply client over a broker. Each request waits on its own
/// private reply queue.
#[derive(Clone)]
pub struct MqClient {
    name: String,
    broker: Arc<dyn Broker>,
    credentials: Credentials,
    timeout: Duration,
}

impl MqClient {
    pub fn new(name: impl Into<String>, broker: Arc<dyn Broker>) -> Self {
        Self {
            name: name.into(),
            broker,
            credentials: Credentials::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fire-and-forget: the reply lands on the type's `.outq`.
    pub async fn publish<T: Serialize>(&self, type_name: &str, body: &T) -> Result<Message, MqError> {
        let message = Message::new(serde_json::to_value(body)?).with_credentials(self.credentials.clone());
        self.broker.publish(&inbound_queue(type_name), &message).await?;
        Ok(message)
    }

    /// Sends `body` to `type_name`'s inbound queue and waits for the reply.
    /// Error replies come back as messages with `error` set.
    pub async fn request<T: Serialize>(&self, type_name: &str, body: &T) -> Result<Message, MqError> {
        let reply_to = unique_reply_queue(&self.name);
        let message = Message::new(serde_json::to_value(body)?)
            .with_reply_to(reply_to.clone())
            .with_credentials(self.credentials.clone());

        self.broker.publish(&inbound_queue(type_name), &message).await?;
        tracing::debug!(type_name, message_id = %message.id, reply_to = %reply_to, "request sent");

        let queues = [reply_to];
        match self.broker.receive(&queues, self.timeout).await? {
            Some((_, reply)) => Ok(reply),
            None => Err(MqError::Unavailable(format!(
                "no reply to {} within {:?}",
                type_name, self.timeout
            ))),
        }
    }

    /// Runs a Get query and decodes the result list.
    pub async fn get<Q, T>(&self, query: &Q) -> Result<Vec<T>, MqError>
    where
        Q: Filter,
        T: DeserializeOwned,
    {
        let reply = self.request(Q::GET_NAME, query).await?;
        if let Some(error) = reply.error {
            return Err(MqError::Unavailable(format!(
                "{} failed with {}: {}",
                Q::GET_NAME,
                error.status,
                error.message
            )));
        }
        Ok(reply.body_as()?)
    }
}
