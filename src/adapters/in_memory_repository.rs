//! In-process repositories for tests and store-less local runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::AuthUser;
use crate::domain::{Entity, Filter};
use crate::ports::{Repository, RepositoryError, RepositoryResult, UserRepository};

struct Table<E> {
    rows: BTreeMap<i64, E>,
    next_id: i64,
    failure: Option<String>,
}

impl<E: Entity> Table<E> {
    fn check_available(&self) -> RepositoryResult<()> {
        match &self.failure {
            Some(reason) => Err(RepositoryError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn insert(&mut self, entity: &E) -> E {
        let id = self.next_id;
        self.next_id += 1;
        let row = entity.clone().with_id(id);
        self.rows.insert(id, row.clone());
        row
    }
}

/// Map-backed repository. Ids are assigned from a counter, like a sequence.
pub struct InMemoryRepository<E> {
    table: Arc<RwLock<Table<E>>>,
}

impl<E> Clone for InMemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    /// Repository pre-populated with `rows`; ids are assigned in order.
    pub fn with_rows(rows: impl IntoIterator<Item = E>) -> Self {
        let mut table = Table {
            rows: BTreeMap::new(),
            next_id: 1,
            failure: None,
        };
        for row in rows {
            table.insert(&row);
        }

        Self {
            table: Arc::new(RwLock::new(table)),
        }
    }

    /// Makes every subsequent call fail as if the store were down.
    pub async fn fail_with(&self, reason: impl Into<String>) {
        self.table.write().await.failure = Some(reason.into());
    }

    pub async fn recover(&self) {
        self.table.write().await.failure = None;
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for InMemoryRepository<E> {
    async fn select(&self, query: &E::Query) -> RepositoryResult<Vec<E>> {
        let table = self.table.read().await;
        table.check_available()?;

        Ok(table
            .rows
            .values()
            .filter(|row| query.matches(*row))
            .cloned()
            .collect())
    }

    async fn insert(&self, entity: &E) -> RepositoryResult<E> {
        let mut table = self.table.write().await;
        table.check_available()?;
        Ok(table.insert(entity))
    }

    async fn update(&self, entity: &E) -> RepositoryResult<E> {
        let mut table = self.table.write().await;
        table.check_available()?;

        let id = entity.id().ok_or_else(|| {
            RepositoryError::InvalidQuery(format!("{} update requires an id", E::NAME))
        })?;
        match table.rows.get_mut(&id) {
            Some(row) => {
                *row = entity.clone();
                Ok(row.clone())
            }
            None => Err(RepositoryError::NotFound(format!("{} {}", E::NAME, id))),
        }
    }

    async fn delete(&self, query: &E::Query) -> RepositoryResult<u64> {
        let mut table = self.table.write().await;
        table.check_available()?;

        if query.conditions().is_empty() {
            return Err(RepositoryError::InvalidQuery(format!(
                "{} requires at least one filter",
                <E::Query as Filter>::DELETE_NAME
            )));
        }

        let before = table.rows.len();
        table.rows.retain(|_, row| !query.matches(&*row));
        Ok((before - table.rows.len()) as u64)
    }
}

/// Map-backed credential store.
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<String, AuthUser>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_name(&self, user_name: &str) -> RepositoryResult<Option<AuthUser>> {
        Ok(self.users.read().await.get(user_name).cloned())
    }

    async fn create(&self, user: &AuthUser) -> RepositoryResult<AuthUser> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.user_name) {
            return Err(RepositoryError::InvalidQuery(format!(
                "user {} already exists",
                user.user_name
            )));
        }

        let created = AuthUser {
            id: Some(users.len() as i64 + 1),
            ..user.clone()
        };
        users.insert(created.user_name.clone(), created.clone());
        Ok(created)
    }
}
