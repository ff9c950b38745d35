//! Authentication: credential store, sessions, and the enforcement policy
//! shared by the REST and message-queue transports.

pub mod authenticator;
pub mod password;
pub mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

pub use authenticator::{basic_header, parse_basic, AuthError, Authenticated, Authenticator, Credentials};
pub use session::{Session, SessionStore};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "ss-id";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Option<i64>,
    pub user_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

/// The four operation kinds every entity exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Get,
    Post,
    Put,
    Delete,
}

impl Operation {
    pub fn is_write(self) -> bool {
        !matches!(self, Operation::Get)
    }
}

/// Which operations need an authenticated caller. Applied identically by
/// every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPolicy {
    /// Nothing is guarded.
    None,
    /// Post, Put and Delete are guarded; reads are open.
    #[default]
    Writes,
    /// Every operation is guarded.
    All,
}

impl AuthPolicy {
    pub fn requires_auth(self, operation: Operation) -> bool {
        match self {
            AuthPolicy::None => false,
            AuthPolicy::Writes => operation.is_write(),
            AuthPolicy::All => true,
        }
    }
}

impl FromStr for AuthPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "none" => Ok(AuthPolicy::None),
            "writes" => Ok(AuthPolicy::Writes),
            "all" => Ok(AuthPolicy::All),
            other => anyhow::bail!("AUTH_POLICY must be one of none, writes, all (got '{}')", other),
        }
    }
}

impl fmt::Display for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthPolicy::None => "none",
            AuthPolicy::Writes => "writes",
            AuthPolicy::All => "all",
        };
        f.write_str(name)
    }
}
