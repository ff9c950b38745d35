use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::AuthUser;
use crate::ports::{RepositoryError, RepositoryResult, UserRepository};

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed credential store over `auth_users`.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_name(&self, user_name: &str) -> RepositoryResult<Option<AuthUser>> {
        let user = sqlx::query_as::<_, AuthUser>(
            "SELECT id, user_name, password_hash, salt, created_at FROM auth_users WHERE user_name = $1",
        )
        .bind(user_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: &AuthUser) -> RepositoryResult<AuthUser> {
        let created = sqlx::query_as::<_, AuthUser>(
            r#"
            INSERT INTO auth_users (user_name, password_hash, salt, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_name, password_hash, salt, created_at
            "#,
        )
        .bind(&user.user_name)
        .bind(&user.password_hash)
        .bind(&user.salt)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| create_error(e, &user.user_name))?;

        tracing::info!(user_name = %created.user_name, "auth user created");
        Ok(created)
    }
}

/// A taken user name is a caller error, like in the in-memory store.
fn create_error(err: sqlx::Error, user_name: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            RepositoryError::InvalidQuery(format!("user {} already exists", user_name))
        }
        _ => RepositoryError::Database(err),
    }
}
