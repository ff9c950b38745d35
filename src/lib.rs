pub mod adapters;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod logic;
pub mod middleware;
pub mod mq;
pub mod ports;
pub mod services;
pub mod startup;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::auth::{AuthPolicy, Authenticator};
use crate::health::HealthChecker;
use crate::middleware::AuthGuard;
use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub authenticator: Authenticator,
    pub policy: AuthPolicy,
    pub login_path: String,
    pub health: HealthChecker,
    pub cors_allowed_origins: Option<Vec<String>>,
}

pub fn create_app(state: AppState) -> Router {
    let guard = AuthGuard::new(state.authenticator.clone(), state.policy);

    let auth_routes = Router::new()
        .route(&state.login_path, post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .with_state(state.authenticator.clone());

    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .with_state(state.health.clone());

    let app = Router::new()
        .merge(health_routes)
        .merge(auth_routes)
        .merge(state.services.rest_routes(guard))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ));

    match cors_layer(state.cors_allowed_origins.as_deref()) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn cors_layer(origins: Option<&[String]>) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins?
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}
