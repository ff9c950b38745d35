//! Composition root: repositories → logic adapters → transport bindings.

use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;

use crate::adapters::{
    InMemoryRepository, InMemoryUserRepository, PostgresRepository, PostgresUserRepository,
};
use crate::domain::{
    CurrencyType, Transaction, TransactionNotificationStatusType, TransactionStatusType,
    TransactionType,
};
use crate::handlers::rest::entity_routes;
use crate::logic::{EntityLogic, Rest};
use crate::middleware::AuthGuard;
use crate::mq::HandlerRegistry;
use crate::ports::{Repository, UserRepository};

pub const CURRENCY_TYPES_PATH: &str = "/currency-types";
pub const TRANSACTION_TYPES_PATH: &str = "/transaction-types";
pub const TRANSACTION_STATUS_TYPES_PATH: &str = "/transaction-status-types";
pub const TRANSACTION_NOTIFICATION_STATUS_TYPES_PATH: &str =
    "/transaction-notification-status-types";
pub const TRANSACTIONS_PATH: &str = "/transactions";

#[derive(Clone)]
pub struct Repositories {
    pub currency_types: Arc<dyn Repository<CurrencyType>>,
    pub transaction_types: Arc<dyn Repository<TransactionType>>,
    pub transaction_status_types: Arc<dyn Repository<TransactionStatusType>>,
    pub transaction_notification_status_types: Arc<dyn Repository<TransactionNotificationStatusType>>,
    pub transactions: Arc<dyn Repository<Transaction>>,
    pub users: Arc<dyn UserRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            currency_types: Arc::new(PostgresRepository::new(pool.clone())),
            transaction_types: Arc::new(PostgresRepository::new(pool.clone())),
            transaction_status_types: Arc::new(PostgresRepository::new(pool.clone())),
            transaction_notification_status_types: Arc::new(PostgresRepository::new(pool.clone())),
            transactions: Arc::new(PostgresRepository::new(pool.clone())),
            users: Arc::new(PostgresUserRepository::new(pool)),
        }
    }

    /// Process-local stores holding the same lookup rows the migrations seed.
    pub fn in_memory() -> Self {
        Self {
            currency_types: Arc::new(InMemoryRepository::with_rows(seed_currency_types())),
            transaction_types: Arc::new(InMemoryRepository::with_rows(
                [
                    "AuthorizeAndCapture",
                    "AuthorizeOnly",
                    "Capture",
                    "Credit",
                    "Void",
                ]
                .map(TransactionType::new),
            )),
            transaction_status_types: Arc::new(InMemoryRepository::with_rows(
                ["Pending", "Approved", "Declined", "Error"].map(TransactionStatusType::new),
            )),
            transaction_notification_status_types: Arc::new(InMemoryRepository::with_rows(
                ["Pending", "Sent", "Failed"].map(TransactionNotificationStatusType::new),
            )),
            transactions: Arc::new(InMemoryRepository::<Transaction>::new()),
            users: Arc::new(InMemoryUserRepository::new()),
        }
    }
}

fn seed_currency_types() -> Vec<CurrencyType> {
    vec![
        CurrencyType::new("USD", "US Dollar"),
        CurrencyType::new("EUR", "Euro"),
        CurrencyType::new("GBP", "Pound Sterling"),
    ]
}

/// One logic adapter per entity, shared by both transports.
#[derive(Clone)]
pub struct Services {
    pub currency_types: Arc<dyn Rest<CurrencyType>>,
    pub transaction_types: Arc<dyn Rest<TransactionType>>,
    pub transaction_status_types: Arc<dyn Rest<TransactionStatusType>>,
    pub transaction_notification_status_types: Arc<dyn Rest<TransactionNotificationStatusType>>,
    pub transactions: Arc<dyn Rest<Transaction>>,
}

impl Services {
    pub fn from_repositories(repositories: &Repositories) -> Self {
        Self {
            currency_types: Arc::new(EntityLogic::new(Arc::clone(&repositories.currency_types))),
            transaction_types: Arc::new(EntityLogic::new(Arc::clone(
                &repositories.transaction_types,
            ))),
            transaction_status_types: Arc::new(EntityLogic::new(Arc::clone(
                &repositories.transaction_status_types,
            ))),
            transaction_notification_status_types: Arc::new(EntityLogic::new(Arc::clone(
                &repositories.transaction_notification_status_types,
            ))),
            transactions: Arc::new(EntityLogic::new(Arc::clone(&repositories.transactions))),
        }
    }

    /// Every entity's queues bound to its logic adapter.
    pub fn handler_registry(&self) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register_entity(Arc::clone(&self.currency_types));
        registry.register_entity(Arc::clone(&self.transaction_types));
        registry.register_entity(Arc::clone(&self.transaction_status_types));
        registry.register_entity(Arc::clone(&self.transaction_notification_status_types));
        registry.register_entity(Arc::clone(&self.transactions));
        registry
    }

    /// Every entity's REST route, guarded by `guard`.
    pub fn rest_routes(&self, guard: AuthGuard) -> Router {
        Router::new()
            .merge(entity_routes(
                CURRENCY_TYPES_PATH,
                Arc::clone(&self.currency_types),
                guard.clone(),
            ))
            .merge(entity_routes(
                TRANSACTION_TYPES_PATH,
                Arc::clone(&self.transaction_types),
                guard.clone(),
            ))
            .merge(entity_routes(
                TRANSACTION_STATUS_TYPES_PATH,
                Arc::clone(&self.transaction_status_types),
                guard.clone(),
            ))
            .merge(entity_routes(
                TRANSACTION_NOTIFICATION_STATUS_TYPES_PATH,
                Arc::clone(&self.transaction_notification_status_types),
                guard.clone(),
            ))
            .merge(entity_routes(
                TRANSACTIONS_PATH,
                Arc::clone(&self.transactions),
                guard,
            ))
    }
}
