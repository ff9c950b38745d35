use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::password::{hash_password, new_salt, verify_password, DEFAULT_ROUNDS};
use super::session::{Session, SessionStore};
use super::AuthUser;
use crate::ports::{RepositoryError, UserRepository};

/// What a caller presented: an `Authorization` header value and/or a
/// session id. REST fills this from headers and cookies, the message queue
/// from message fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub authorization: Option<String>,
    pub session_id: Option<String>,
}

impl Credentials {
    pub fn basic(user_name: &str, password: &str) -> Self {
        Self {
            authorization: Some(basic_header(user_name, password)),
            session_id: None,
        }
    }

    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            authorization: None,
            session_id: Some(session_id.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.authorization.is_none() && self.session_id.is_none()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredentials,

    #[error("invalid user name or password")]
    InvalidCredentials,

    #[error("session expired or unknown")]
    InvalidSession,

    #[error("malformed authorization header: {0}")]
    Malformed(String),

    #[error("credential store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Result of a successful authentication.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user_name: String,
    /// The session the caller presented, or the one opened for it.
    pub session: Option<Session>,
    /// True when `session` was opened by this call.
    pub issued: bool,
}

#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserRepository>,
    sessions: SessionStore,
    hash_rounds: u32,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserRepository>, sessions: SessionStore) -> Self {
        Self {
            users,
            sessions,
            hash_rounds: DEFAULT_ROUNDS,
        }
    }

    /// PBKDF2 rounds used when registering users.
    pub fn with_hash_rounds(mut self, rounds: u32) -> Self {
        self.hash_rounds = rounds.max(1);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn register(&self, user_name: &str, password: &str) -> Result<AuthUser, AuthError> {
        if user_name.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Malformed(
                "user name and password must not be empty".to_string(),
            ));
        }

        let salt = new_salt();
        let user = AuthUser {
            id: None,
            user_name: user_name.to_string(),
            password_hash: hash_password(password, &salt, self.hash_rounds),
            salt,
            created_at: Utc::now(),
        };

        Ok(self.users.create(&user).await?)
    }

    /// Checks a user name and password without touching the session store.
    pub async fn verify(&self, user_name: &str, password: &str) -> Result<AuthUser, AuthError> {
        let user = self
            .users
            .find_by_name(user_name)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.salt, &user.password_hash) {
            tracing::warn!(user_name = %user_name, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Checks a user name and password and opens a session.
    pub async fn login(&self, user_name: &str, password: &str) -> Result<Session, AuthError> {
        let user = self.verify(user_name, password).await?;
        Ok(self.sessions.create(&user.user_name).await)
    }

    pub async fn logout(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).await
    }

    /// Resolves credentials to a user. A live session id is used as is;
    /// otherwise Basic credentials are verified without opening a session.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Authenticated, AuthError> {
        if let Some(id) = &credentials.session_id {
            if let Some(session) = self.sessions.get(id).await {
                return Ok(Authenticated {
                    user_name: session.user_name.clone(),
                    session: Some(session),
                    issued: false,
                });
            }
        }

        match &credentials.authorization {
            Some(header) => {
                let (user_name, password) = parse_basic(header)?;
                let user = self.verify(&user_name, &password).await?;
                Ok(Authenticated {
                    user_name: user.user_name,
                    session: None,
                    issued: false,
                })
            }
            None if credentials.session_id.is_some() => Err(AuthError::InvalidSession),
            None => Err(AuthError::MissingCredentials),
        }
    }

    /// Like [`authenticate`](Self::authenticate), but opens a session when
    /// the caller had none, so a cookie can be handed back.
    pub async fn authenticate_or_open_session(
        &self,
        credentials: &Credentials,
    ) -> Result<Authenticated, AuthError> {
        let outcome = self.authenticate(credentials).await?;
        if outcome.session.is_some() {
            return Ok(outcome);
        }

        let session = self.sessions.create(&outcome.user_name).await;
        Ok(Authenticated {
            session: Some(session),
            issued: true,
            ..outcome
        })
    }
}

/// `Basic base64(user:password)` header value.
pub fn basic_header(user_name: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user_name, password)))
}

/// Splits a `Basic` header value into user name and password.
pub fn parse_basic(header: &str) -> Result<(String, String), AuthError> {
    let encoded = header
        .trim()
        .strip_prefix("Basic ")
        .or_else(|| header.trim().strip_prefix("basic "))
        .ok_or_else(|| AuthError::Malformed("expected Basic scheme".to_string()))?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AuthError::Malformed(e.to_string()))?;
    let decoded = String::from_utf8(decoded).map_err(|e| AuthError::Malformed(e.to_string()))?;

    let (user_name, password) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::Malformed("missing ':' separator".to_string()))?;

    Ok((user_name.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryUserRepository;

    async fn authenticator() -> Authenticator {
        let authenticator = Authenticator::new(
            Arc::new(InMemoryUserRepository::new()),
            SessionStore::new(3600),
        )
        .with_hash_rounds(1_000);
        authenticator.register("admin", "secret").await.unwrap();
        authenticator
    }

    #[test]
    fn test_parse_basic_roundtrip() {
        let header = basic_header("admin", "pa:ss");
        let (user, pass) = parse_basic(&header).unwrap();

        assert_eq!(user, "admin");
        assert_eq!(pass, "pa:ss");
    }

    #[test]
    fn test_parse_basic_rejects_other_schemes() {
        assert!(matches!(
            parse_basic("Bearer abc"),
            Err(AuthError::Malformed(_))
        ));
        assert!(matches!(
            parse_basic("Basic !!!"),
            Err(AuthError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_basic_credentials_open_session_only_when_asked() {
        let authenticator = authenticator().await;

        let verified = authenticator
            .authenticate(&Credentials::basic("admin", "secret"))
            .await
            .unwrap();
        assert_eq!(verified.user_name, "admin");
        assert!(verified.session.is_none());
        assert_eq!(authenticator.sessions().len().await, 0);

        let opened = authenticator
            .authenticate_or_open_session(&Credentials::basic("admin", "secret"))
            .await
            .unwrap();
        assert!(opened.issued);
        let session = opened.session.unwrap();

        let again = authenticator
            .authenticate_or_open_session(&Credentials::session(session.id.clone()))
            .await
            .unwrap();
        assert!(!again.issued);
        assert_eq!(again.session.map(|s| s.id), Some(session.id));
        assert_eq!(authenticator.sessions().len().await, 1);
    }

    #[tokio::test]
    async fn test_repeated_basic_calls_keep_session_count_flat() {
        let authenticator = authenticator().await;
        let credentials = Credentials::basic("admin", "secret");

        for _ in 0..50 {
            authenticator.authenticate(&credentials).await.unwrap();
        }
        assert_eq!(authenticator.sessions().len().await, 0);

        let session = authenticator.login("admin", "secret").await.unwrap();
        let both = Credentials {
            session_id: Some(session.id),
            ..credentials
        };
        for _ in 0..50 {
            let outcome = authenticator.authenticate_or_open_session(&both).await.unwrap();
            assert!(!outcome.issued);
        }
        assert_eq!(authenticator.sessions().len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_user_is_invalid_query() {
        let authenticator = authenticator().await;

        assert!(matches!(
            authenticator.register("admin", "other").await,
            Err(AuthError::Store(RepositoryError::InvalidQuery(_)))
        ));
    }

    #[tokio::test]
    async fn test_stale_session_falls_back_to_basic() {
        let authenticator = authenticator().await;
        let credentials = Credentials {
            session_id: Some("stale".to_string()),
            ..Credentials::basic("admin", "secret")
        };

        let outcome = authenticator.authenticate(&credentials).await.unwrap();
        assert_eq!(outcome.user_name, "admin");
    }

    #[tokio::test]
    async fn test_wrong_password_and_missing_credentials() {
        let authenticator = authenticator().await;

        assert!(matches!(
            authenticator
                .authenticate(&Credentials::basic("admin", "nope"))
                .await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticator.authenticate(&Credentials::default()).await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            authenticator
                .authenticate(&Credentials::session("stale"))
                .await,
            Err(AuthError::InvalidSession)
        ));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let authenticator = authenticator().await;
        let session = authenticator.login("admin", "secret").await.unwrap();

        assert!(authenticator.logout(&session.id).await);
        assert!(authenticator
            .authenticate(&Credentials::session(session.id))
            .await
            .is_err());
    }
}
