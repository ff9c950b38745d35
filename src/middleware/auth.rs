use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{AuthPolicy, Authenticator, Credentials, Operation, SESSION_COOKIE};
use crate::error::AppError;

/// State for [`require_auth`].
#[derive(Clone)]
pub struct AuthGuard {
    pub authenticator: Authenticator,
    pub policy: AuthPolicy,
}

impl AuthGuard {
    pub fn new(authenticator: Authenticator, policy: AuthPolicy) -> Self {
        Self {
            authenticator,
            policy,
        }
    }
}

pub fn operation_for(method: &Method) -> Operation {
    match *method {
        Method::POST => Operation::Post,
        Method::PUT | Method::PATCH => Operation::Put,
        Method::DELETE => Operation::Delete,
        _ => Operation::Get,
    }
}

/// Credentials carried by a request: the `Authorization` header and the
/// session cookie.
pub fn credentials_from(headers: &HeaderMap) -> Credentials {
    Credentials {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
        session_id: session_cookie(headers),
    }
}

pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value for a session id.
pub fn session_set_cookie(session_id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, session_id)
}

/// Rejects guarded requests that carry no valid credentials. Basic
/// credentials without a live session cookie open a session, and the
/// response sets its cookie.
pub async fn require_auth(
    State(guard): State<AuthGuard>,
    req: Request,
    next: Next,
) -> Response {
    let operation = operation_for(req.method());
    if !guard.policy.requires_auth(operation) {
        return next.run(req).await;
    }

    let credentials = credentials_from(req.headers());
    let outcome = match guard.authenticator.authenticate_or_open_session(&credentials).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(method = %req.method(), uri = %req.uri(), error = %e, "request rejected");
            return AppError::from(e).into_response();
        }
    };

    let mut response = next.run(req).await;
    if let (true, Some(session)) = (outcome.issued, &outcome.session) {
        if let Ok(cookie) = HeaderValue::from_str(&session_set_cookie(&session.id)) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}
