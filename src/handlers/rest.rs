//! Generic REST binding: one route per entity, four verbs, each calling the
//! entity's logic adapter directly.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::Entity;
use crate::error::AppError;
use crate::logic::Rest;
use crate::middleware::{require_auth, AuthGuard};

type Logic<E> = State<Arc<dyn Rest<E>>>;

pub async fn get_entities<E: Entity>(
    State(logic): Logic<E>,
    query: Result<Query<E::Query>, QueryRejection>,
) -> Result<Json<Vec<E>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let rows = logic.get(query).await?;
    Ok(Json(rows))
}

/// 201 when a new row was created, 200 when an existing id was reposted.
pub async fn post_entity<E: Entity>(
    State(logic): Logic<E>,
    body: Result<Json<E>, JsonRejection>,
) -> Result<(StatusCode, Json<E>), AppError> {
    let Json(entity) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let status = if entity.id().is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    let saved = logic.post(entity).await?;
    tracing::info!(entity = E::NAME, id = ?saved.id(), "saved");
    Ok((status, Json(saved)))
}

pub async fn put_entity<E: Entity>(
    State(logic): Logic<E>,
    body: Result<Json<E>, JsonRejection>,
) -> Result<Json<E>, AppError> {
    let Json(entity) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let saved = logic.put(entity).await?;
    Ok(Json(saved))
}

pub async fn delete_entities<E: Entity>(
    State(logic): Logic<E>,
    query: Result<Query<E::Query>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let rows_affected = logic.delete(query).await?;
    tracing::info!(entity = E::NAME, rows_affected, "deleted");

    Ok(Json(json!({
        "acknowledged": true,
        "rows_affected": rows_affected,
    })))
}

/// `GET/POST/PUT/DELETE <path>` for one entity, guarded by `guard`'s policy.
pub fn entity_routes<E: Entity>(path: &str, logic: Arc<dyn Rest<E>>, guard: AuthGuard) -> Router {
    Router::new()
        .route(
            path,
            get(get_entities::<E>)
                .post(post_entity::<E>)
                .put(put_entity::<E>)
                .delete(delete_entities::<E>),
        )
        .route_layer(middleware::from_fn_with_state(guard, require_auth))
        .with_state(logic)
}
