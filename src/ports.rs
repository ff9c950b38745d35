//! Storage contracts. Adapters live in `crate::adapters`.

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::AuthUser;
use crate::domain::Entity;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Basic select/insert/update/delete over one table.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Rows matching every condition of `query`, ordered by id.
    async fn select(&self, query: &E::Query) -> RepositoryResult<Vec<E>>;

    /// Inserts a row; the store assigns the id.
    async fn insert(&self, entity: &E) -> RepositoryResult<E>;

    /// Rewrites the row named by `entity.id`.
    async fn update(&self, entity: &E) -> RepositoryResult<E>;

    /// Removes matching rows. A query without conditions is rejected.
    async fn delete(&self, query: &E::Query) -> RepositoryResult<u64>;
}

/// Credential store backing HTTP Basic authentication.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_name(&self, user_name: &str) -> RepositoryResult<Option<AuthUser>>;

    async fn create(&self, user: &AuthUser) -> RepositoryResult<AuthUser>;
}
