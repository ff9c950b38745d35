//! Handler table: inbound queue → dispatch-wrapper call on a logic adapter.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::inbound_queue;
use crate::auth::Operation;
use crate::dispatch::{self, ErrorEnvelope, Reply};
use crate::domain::{Entity, Filter, PutDto};
use crate::logic::Rest;

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Reply> + Send + Sync>;

#[derive(Clone)]
pub struct Registration {
    pub type_name: String,
    pub operation: Operation,
    handler: Handler,
}

impl Registration {
    pub async fn call(&self, body: Value) -> Reply {
        (self.handler)(body).await
    }
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    by_queue: HashMap<String, Registration>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `type_name`'s inbound queue to `handler`. A later registration
    /// for the same type replaces the earlier one.
    pub fn register<F, Fut>(&mut self, type_name: &str, operation: Operation, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |body| Box::pin(handler(body)));
        let registration = Registration {
            type_name: type_name.to_string(),
            operation,
            handler,
        };

        if self
            .by_queue
            .insert(inbound_queue(type_name), registration)
            .is_some()
        {
            tracing::warn!(type_name, "handler replaced");
        }
    }

    pub fn register_get<E: Entity>(&mut self, logic: Arc<dyn Rest<E>>) {
        let type_name = <E::Query as Filter>::GET_NAME;
        self.register(type_name, Operation::Get, move |body| {
            let logic = Arc::clone(&logic);
            async move {
                let query: E::Query = decode(type_name, body)?;
                dispatch::get_wrapper(query, logic.as_ref()).await
            }
        });
    }

    pub fn register_post<E: Entity>(&mut self, logic: Arc<dyn Rest<E>>) {
        self.register(E::NAME, Operation::Post, move |body| {
            let logic = Arc::clone(&logic);
            async move {
                let entity: E = decode(E::NAME, body)?;
                dispatch::post_request(entity, |e| logic.post(e)).await
            }
        });
    }

    pub fn register_put<E: Entity>(&mut self, logic: Arc<dyn Rest<E>>) {
        let type_name = PutDto::<E>::type_name();
        let decode_name = type_name.clone();
        self.register(&type_name, Operation::Put, move |body| {
            let logic = Arc::clone(&logic);
            let decode_name = decode_name.clone();
            async move {
                let dto: PutDto<E> = decode(&decode_name, body)?;
                dispatch::put_wrapper(dto, logic.as_ref()).await
            }
        });
    }

    pub fn register_delete<E: Entity>(&mut self, logic: Arc<dyn Rest<E>>) {
        let type_name = <E::Query as Filter>::DELETE_NAME;
        self.register(type_name, Operation::Delete, move |body| {
            let logic = Arc::clone(&logic);
            async move {
                let query: E::Query = decode(type_name, body)?;
                dispatch::delete_wrapper(query, logic.as_ref()).await
            }
        });
    }

    /// Get, Post, Put and Delete bindings for one entity.
    pub fn register_entity<E: Entity>(&mut self, logic: Arc<dyn Rest<E>>) {
        self.register_get(Arc::clone(&logic));
        self.register_post(Arc::clone(&logic));
        self.register_put(Arc::clone(&logic));
        self.register_delete(logic);
    }

    pub fn lookup(&self, queue: &str) -> Option<&Registration> {
        self.by_queue.get(queue)
    }

    /// Registered inbound queues, sorted so polling order is stable.
    pub fn queues(&self) -> Vec<String> {
        let mut queues: Vec<String> = self.by_queue.keys().cloned().collect();
        queues.sort();
        queues
    }

    pub fn len(&self) -> usize {
        self.by_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_queue.is_empty()
    }
}

/// A missing/null body decodes as `{}` so empty query DTOs need no payload.
fn decode<T: DeserializeOwned>(type_name: &str, body: Value) -> Result<T, ErrorEnvelope> {
    let body = if body.is_null() {
        Value::Object(Map::new())
    } else {
        body
    };

    serde_json::from_value(body)
        .map_err(|e| ErrorEnvelope::bad_request(format!("invalid {} body: {}", type_name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryRepository;
    use crate::domain::{CurrencyType, TransactionStatusType};
    use crate::logic::EntityLogic;
    use serde_json::json;

    fn currency_logic() -> Arc<dyn Rest<CurrencyType>> {
        Arc::new(EntityLogic::new(Arc::new(InMemoryRepository::with_rows(
            vec![
                CurrencyType::new("USD", "US Dollar"),
                CurrencyType::new("EUR", "Euro"),
            ],
        ))))
    }

    #[test]
    fn test_register_entity_binds_four_queues() {
        let mut registry = HandlerRegistry::new();
        registry.register_entity(currency_logic());

        assert_eq!(
            registry.queues(),
            vec![
                "mq:CurrencyType.inq".to_string(),
                "mq:DeleteCurrencyType.inq".to_string(),
                "mq:GetCurrencyTypes.inq".to_string(),
                "mq:PutCurrencyType.inq".to_string(),
            ]
        );
        assert_eq!(
            registry.lookup("mq:DeleteCurrencyType.inq").unwrap().operation,
            Operation::Delete
        );
    }

    #[tokio::test]
    async fn test_null_body_decodes_as_empty_query() {
        let mut registry = HandlerRegistry::new();
        registry.register_get(currency_logic());

        let reply = registry
            .lookup("mq:GetCurrencyTypes.inq")
            .unwrap()
            .call(Value::Null)
            .await
            .unwrap();
        assert_eq!(reply.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_bad_body_is_400() {
        let mut registry = HandlerRegistry::new();
        registry.register_post(currency_logic());

        let envelope = registry
            .lookup("mq:CurrencyType.inq")
            .unwrap()
            .call(json!({"code": 5}))
            .await
            .unwrap_err();
        assert_eq!(envelope.status, 400);
    }

    #[tokio::test]
    async fn test_put_queue_updates_row() {
        let logic: Arc<dyn Rest<TransactionStatusType>> =
            Arc::new(EntityLogic::new(Arc::new(InMemoryRepository::with_rows(
                vec![TransactionStatusType::new("Pending")],
            ))));
        let mut registry = HandlerRegistry::new();
        registry.register_put(logic);

        let reply = registry
            .lookup("mq:PutTransactionStatusType.inq")
            .unwrap()
            .call(json!({"body": {"id": 1, "name": "Queued"}}))
            .await
            .unwrap();
        assert_eq!(reply["name"], "Queued");
    }
}
