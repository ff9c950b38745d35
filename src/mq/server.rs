use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{outbound_queue, type_name_of, Broker, HandlerRegistry, Message};
use crate::auth::{AuthPolicy, Authenticator};
use crate::dispatch::{ErrorEnvelope, Reply};
use crate::error::AppError;

/// Worker pool consuming every registered inbound queue.
#[derive(Clone)]
pub struct MqServer {
    broker: Arc<dyn Broker>,
    registry: Arc<HandlerRegistry>,
    authenticator: Authenticator,
    policy: AuthPolicy,
    workers: usize,
    poll_timeout: Duration,
}

impl MqServer {
    pub fn new(
        broker: Arc<dyn Broker>,
        registry: Arc<HandlerRegistry>,
        authenticator: Authenticator,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            broker,
            registry,
            authenticator,
            policy,
            workers: 1,
            poll_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Runs one inbound message through auth and its handler, producing the
    /// reply message.
    pub async fn handle(&self, queue: &str, message: &Message) -> Message {
        message.reply(self.dispatch(queue, message).await)
    }

    async fn dispatch(&self, queue: &str, message: &Message) -> Reply {
        let registration = self
            .registry
            .lookup(queue)
            .ok_or_else(|| ErrorEnvelope::bad_request(format!("no handler for queue {}", queue)))?;

        if self.policy.requires_auth(registration.operation) {
            let credentials = message.credentials();
            let outcome = self
                .authenticator
                .authenticate(&credentials)
                .await
                .map_err(|e| {
                    tracing::warn!(queue, message_id = %message.id, error = %e, "unauthenticated message");
                    ErrorEnvelope::from(AppError::from(e))
                })?;
            tracing::debug!(queue, user_name = %outcome.user_name, "message authenticated");
        }

        registration.call(message.body.clone()).await
    }

    /// Receives and answers at most one message. Returns false when the poll
    /// timed out empty.
    pub async fn process_one(&self, queues: &[String]) -> Result<bool, super::MqError> {
        let Some((queue, message)) = self.broker.receive(queues, self.poll_timeout).await? else {
            return Ok(false);
        };

        let reply = self.handle(&queue, &message).await;
        let reply_queue = match &message.reply_to {
            Some(reply_to) => reply_to.clone(),
            None => outbound_queue(type_name_of(&queue).unwrap_or(queue.as_str())),
        };

        if let Some(error) = &reply.error {
            tracing::info!(queue = %queue, status = error.status, "replying with error");
        }
        self.broker.publish(&reply_queue, &reply).await?;
        Ok(true)
    }

    /// Spawns the workers. Each stops after its current poll once `shutdown`
    /// flips to true.
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let queues = self.registry.queues();
        tracing::info!(
            workers = self.workers,
            queues = queues.len(),
            policy = %self.policy,
            "starting message queue workers"
        );

        (0..self.workers)
            .map(|worker| {
                let server = self.clone();
                let queues = queues.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { server.run_worker(worker, queues, shutdown).await })
            })
            .collect()
    }

    async fn run_worker(&self, worker: usize, queues: Vec<String>, shutdown: watch::Receiver<bool>) {
        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }
            if let Err(e) = self.process_one(&queues).await {
                tracing::error!(worker, error = %e, "message queue poll failed");
                tokio::time::sleep(self.poll_timeout).await;
            }
        }
        tracing::info!(worker, "message queue worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryRepository, InMemoryUserRepository};
    use crate::auth::{Credentials, SessionStore};
    use crate::domain::{CurrencyType, Transaction};
    use crate::logic::{EntityLogic, Rest};
    use crate::mq::{inbound_queue, InMemoryBroker};
    use serde_json::json;

    async fn server(policy: AuthPolicy) -> (MqServer, InMemoryBroker) {
        let authenticator = Authenticator::new(
            Arc::new(InMemoryUserRepository::new()),
            SessionStore::new(3600),
        )
        .with_hash_rounds(1_000);
        authenticator.register("admin", "secret").await.unwrap();

        let currencies: Arc<dyn Rest<CurrencyType>> =
            Arc::new(EntityLogic::new(Arc::new(InMemoryRepository::with_rows(
                vec![
                    CurrencyType::new("USD", "US Dollar"),
                    CurrencyType::new("EUR", "Euro"),
                    CurrencyType::new("GBP", "Pound Sterling"),
                ],
            ))));
        let transactions: Arc<dyn Rest<Transaction>> =
            Arc::new(EntityLogic::new(Arc::new(InMemoryRepository::new())));

        let mut registry = HandlerRegistry::new();
        registry.register_entity(currencies);
        registry.register_entity(transactions);

        let broker = InMemoryBroker::new();
        let server = MqServer::new(
            Arc::new(broker.clone()),
            Arc::new(registry),
            authenticator,
            policy,
        )
        .with_poll_timeout(Duration::from_millis(50));
        (server, broker)
    }

    #[tokio::test]
    async fn test_unknown_queue_is_400() {
        let (server, _) = server(AuthPolicy::Writes).await;
        let reply = server
            .handle("mq:Nothing.inq", &Message::new(json!({})))
            .await;

        assert_eq!(reply.error.map(|e| e.status), Some(400));
    }

    #[tokio::test]
    async fn test_open_read_needs_no_credentials() {
        let (server, _) = server(AuthPolicy::Writes).await;
        let reply = server
            .handle(&inbound_queue("GetCurrencyTypes"), &Message::new(json!({})))
            .await;

        assert!(!reply.is_error_response());
        assert_eq!(reply.body.as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_guarded_write_without_credentials_is_401() {
        let (server, _) = server(AuthPolicy::Writes).await;
        let reply = server
            .handle(&inbound_queue("DeleteCurrencyType"), &Message::new(json!({"code": "USD"})))
            .await;

        assert_eq!(reply.error.map(|e| e.status), Some(401));
    }

    #[tokio::test]
    async fn test_all_policy_guards_reads_and_accepts_basic() {
        let (server, _) = server(AuthPolicy::All).await;
        let queue = inbound_queue("GetCurrencyTypes");

        let denied = server.handle(&queue, &Message::new(json!({}))).await;
        assert!(denied.is_error_response());

        let request = Message::new(json!({})).with_credentials(Credentials::basic("admin", "secret"));
        let allowed = server.handle(&queue, &request).await;
        assert!(!allowed.is_error_response());
    }

    #[tokio::test]
    async fn test_basic_messages_open_no_sessions() {
        let (server, _) = server(AuthPolicy::All).await;
        let queue = inbound_queue("GetCurrencyTypes");

        for _ in 0..25 {
            let request =
                Message::new(json!({})).with_credentials(Credentials::basic("admin", "secret"));
            assert!(!server.handle(&queue, &request).await.is_error_response());
        }
        assert_eq!(server.authenticator.sessions().len().await, 0);
    }

    #[tokio::test]
    async fn test_reply_goes_to_outq_without_reply_to() {
        let (server, broker) = server(AuthPolicy::None).await;
        let queues = vec![inbound_queue("GetCurrencyTypes")];
        broker
            .publish(&queues[0], &Message::new(json!({"code": "EUR"})))
            .await
            .unwrap();

        assert!(server.process_one(&queues).await.unwrap());
        assert_eq!(broker.pending("mq:GetCurrencyTypes.outq"), 1);
        assert!(!server.process_one(&queues).await.unwrap());
    }

    #[tokio::test]
    async fn test_workers_stop_on_shutdown() {
        let (server, _) = server(AuthPolicy::Writes).await;
        let (tx, rx) = watch::channel(false);
        let handles = server.clone().with_workers(2).start(rx);
        assert_eq!(handles.len(), 2);

        tx.send(true).unwrap();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
