use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{parse_basic, AuthError, Authenticator, SESSION_COOKIE};
use crate::error::AppError;
use crate::middleware::auth::{session_cookie, session_set_cookie};

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub session_id: String,
    pub user_name: String,
}

/// Basic-authenticates the caller and opens a session cookie.
pub async fn login(
    State(authenticator): State<Authenticator>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;
    let (user_name, password) = parse_basic(header)?;

    let session = authenticator.login(&user_name, &password).await?;
    tracing::info!(user_name = %session.user_name, "logged in");

    let cookie = session_set_cookie(&session.id);
    let body = LoginResponse {
        session_id: session.id,
        user_name: session.user_name,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn logout(State(authenticator): State<Authenticator>, headers: HeaderMap) -> Response {
    let removed = match session_cookie(&headers) {
        Some(id) => authenticator.logout(&id).await,
        None => false,
    };

    let expired = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE);
    (
        [(header::SET_COOKIE, expired)],
        Json(serde_json::json!({ "logged_out": removed })),
    )
        .into_response()
}
