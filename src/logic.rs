//! Business-logic adapters: one `Rest<E>` capability per entity, used
//! unchanged by both the REST handlers and the message-queue dispatch.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{
    CurrencyType, Entity, Transaction, TransactionNotificationStatusType, TransactionStatusType,
    TransactionType,
};
use crate::ports::{Repository, RepositoryResult};

/// Get/Post/Put/Delete over entity `E`, filtered by `E::Query`.
#[async_trait]
pub trait Rest<E: Entity>: Send + Sync {
    async fn get(&self, query: E::Query) -> RepositoryResult<Vec<E>>;

    /// Creates `entity`, or rewrites it in place when it already has an id.
    async fn post(&self, entity: E) -> RepositoryResult<E>;

    async fn put(&self, entity: E) -> RepositoryResult<E>;

    /// Returns the number of rows removed.
    async fn delete(&self, query: E::Query) -> RepositoryResult<u64>;
}

/// Pass-through logic: every call goes straight to the repository.
pub struct EntityLogic<E: Entity> {
    repository: Arc<dyn Repository<E>>,
}

impl<E: Entity> EntityLogic<E> {
    pub fn new(repository: Arc<dyn Repository<E>>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<E: Entity> Rest<E> for EntityLogic<E> {
    async fn get(&self, query: E::Query) -> RepositoryResult<Vec<E>> {
        self.repository.select(&query).await
    }

    async fn post(&self, entity: E) -> RepositoryResult<E> {
        match entity.id() {
            Some(_) => self.repository.update(&entity).await,
            None => self.repository.insert(&entity).await,
        }
    }

    async fn put(&self, entity: E) -> RepositoryResult<E> {
        self.repository.update(&entity).await
    }

    async fn delete(&self, query: E::Query) -> RepositoryResult<u64> {
        self.repository.delete(&query).await
    }
}

pub type CurrencyTypeLogic = EntityLogic<CurrencyType>;
pub type TransactionTypeLogic = EntityLogic<TransactionType>;
pub type TransactionStatusTypeLogic = EntityLogic<TransactionStatusType>;
pub type TransactionNotificationStatusTypeLogic = EntityLogic<TransactionNotificationStatusType>;
pub type TransactionLogic = EntityLogic<Transaction>;
