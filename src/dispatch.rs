//! Uniform wrappers turning a logic-adapter call into a transport reply.
//! One wrapper per operation kind; the message-queue handlers call these so
//! response shaping and error mapping live in a single place.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;

use crate::domain::{Entity, Filter, PutDto};
use crate::error::AppError;
use crate::logic::Rest;
use crate::ports::RepositoryResult;

/// Error reply: numeric status, message and the error's cause chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_code: String,
    pub status: u16,
    pub message: String,
    #[serde(default)]
    pub stack_trace: Option<String>,
}

impl ErrorEnvelope {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into()).into()
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into()).into()
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

impl From<AppError> for ErrorEnvelope {
    fn from(err: AppError) -> Self {
        Self {
            error_code: err.error_code().to_string(),
            status: err.status_code().as_u16(),
            message: err.to_string(),
            stack_trace: Some(err.stack_trace()),
        }
    }
}

pub type Reply = Result<Value, ErrorEnvelope>;

pub async fn get_wrapper<E: Entity>(query: E::Query, logic: &dyn Rest<E>) -> Reply {
    match logic.get(query).await {
        Ok(rows) => encode(&rows),
        Err(e) => Err(failed(<E::Query as Filter>::GET_NAME, e.into())),
    }
}

/// Posts through `post` (normally a logic adapter's `post`).
pub async fn post_request<E, F, Fut>(entity: E, post: F) -> Reply
where
    E: Entity,
    F: FnOnce(E) -> Fut,
    Fut: Future<Output = RepositoryResult<E>>,
{
    match post(entity).await {
        Ok(saved) => encode(&saved),
        Err(e) => Err(failed(E::NAME, e.into())),
    }
}

pub async fn put_wrapper<E: Entity>(dto: PutDto<E>, logic: &dyn Rest<E>) -> Reply {
    match logic.put(dto.body).await {
        Ok(saved) => encode(&saved),
        Err(e) => Err(failed(&PutDto::<E>::type_name(), e.into())),
    }
}

pub async fn delete_wrapper<E: Entity>(query: E::Query, logic: &dyn Rest<E>) -> Reply {
    match logic.delete(query).await {
        Ok(rows_affected) => Ok(json!({
            "acknowledged": true,
            "rows_affected": rows_affected,
        })),
        Err(e) => Err(failed(<E::Query as Filter>::DELETE_NAME, e.into())),
    }
}

fn encode<T: Serialize>(value: &T) -> Reply {
    serde_json::to_value(value)
        .map_err(|e| ErrorEnvelope::from(AppError::Internal(format!("encode failed: {}", e))))
}

fn failed(operation: &str, err: AppError) -> ErrorEnvelope {
    let envelope = ErrorEnvelope::from(err);
    if envelope.is_server_error() {
        tracing::error!(operation, status = envelope.status, error = %envelope.message, "dispatch failed");
    } else {
        tracing::warn!(operation, status = envelope.status, error = %envelope.message, "dispatch rejected");
    }
    envelope
}
