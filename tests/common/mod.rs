#![allow(dead_code)]

use auth202_core::{
    adapters::InMemoryRepository,
    auth::{basic_header, AuthPolicy, Authenticator, SessionStore},
    domain::Transaction,
    health::HealthChecker,
    services::{Repositories, Services},
    create_app, AppState,
};
use axum::{body::Body, http::Response, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub const USER: &str = "admin";
pub const PASSWORD: &str = "secret";

pub struct TestApp {
    pub app: Router,
    pub services: Services,
    pub authenticator: Authenticator,
    pub transactions: InMemoryRepository<Transaction>,
}

/// Router over seeded in-memory stores with one registered user.
pub async fn test_app(policy: AuthPolicy) -> TestApp {
    let transactions = InMemoryRepository::<Transaction>::new();
    let mut repositories = Repositories::in_memory();
    repositories.transactions = Arc::new(transactions.clone());

    let services = Services::from_repositories(&repositories);
    let authenticator = Authenticator::new(
        Arc::clone(&repositories.users),
        SessionStore::new(3600),
    )
    .with_hash_rounds(1_000);
    authenticator.register(USER, PASSWORD).await.unwrap();

    let app = create_app(AppState {
        services: services.clone(),
        authenticator: authenticator.clone(),
        policy,
        login_path: "/auth/basic".to_string(),
        health: HealthChecker::new(),
        cors_allowed_origins: None,
    });

    TestApp {
        app,
        services,
        authenticator,
        transactions,
    }
}

pub fn basic() -> String {
    basic_header(USER, PASSWORD)
}

pub fn transaction_json(gateway_transaction_id: &str) -> Value {
    json!({
        "amount": "25.50",
        "card": "XXXX-XXXX-XXXX-1111",
        "create_date": "2024-03-01T12:00:00Z",
        "subscription_id": 42,
        "gateway_transaction_id": gateway_transaction_id,
        "transaction_type_id": 1,
        "transaction_status_id": 1,
        "gateway_response": "approved"
    })
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
