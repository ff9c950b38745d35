//! Postgres implementation of `Repository<E>`.
//! SQL is generated from the entity's table and column list.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::marker::PhantomData;

use crate::domain::{Entity, FieldValue, Filter};
use crate::ports::{Repository, RepositoryError, RepositoryResult};

/// Postgres-backed repository for one entity table.
pub struct PostgresRepository<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> PostgresRepository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }
}

impl<E> Clone for PostgresRepository<E> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for PostgresRepository<E> {
    async fn select(&self, query: &E::Query) -> RepositoryResult<Vec<E>> {
        let mut builder = select_sql::<E>(query);
        let rows = builder.build_query_as::<E>().fetch_all(&self.pool).await?;

        tracing::debug!(table = E::TABLE, rows = rows.len(), "select");
        Ok(rows)
    }

    async fn insert(&self, entity: &E) -> RepositoryResult<E> {
        let mut builder = insert_sql(entity);
        let row = builder.build_query_as::<E>().fetch_one(&self.pool).await?;

        tracing::debug!(table = E::TABLE, id = ?row.id(), "insert");
        Ok(row)
    }

    async fn update(&self, entity: &E) -> RepositoryResult<E> {
        let id = entity.id().ok_or_else(|| {
            RepositoryError::InvalidQuery(format!("{} update requires an id", E::NAME))
        })?;

        let mut builder = update_sql(entity, id);
        let row = builder
            .build_query_as::<E>()
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("{} {}", E::NAME, id)))
    }

    async fn delete(&self, query: &E::Query) -> RepositoryResult<u64> {
        let mut builder = delete_sql::<E>(query)?;
        let result = builder.build().execute(&self.pool).await?;

        tracing::debug!(
            table = E::TABLE,
            rows_affected = result.rows_affected(),
            "delete"
        );
        Ok(result.rows_affected())
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: FieldValue) {
    match value {
        FieldValue::BigInt(v) => {
            builder.push_bind(v);
        }
        FieldValue::Text(v) => {
            builder.push_bind(v);
        }
        FieldValue::Decimal(v) => {
            builder.push_bind(v);
        }
        FieldValue::Timestamp(v) => {
            builder.push_bind(v);
        }
    }
}

fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, conditions: Vec<(&str, FieldValue)>) {
    for (index, (column, value)) in conditions.into_iter().enumerate() {
        builder.push(if index == 0 { " WHERE " } else { " AND " });
        builder.push(column).push(" = ");
        push_value(builder, value);
    }
}

fn select_sql<E: Entity>(query: &E::Query) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT * FROM {}", E::TABLE));
    push_conditions(&mut builder, query.conditions());
    builder.push(" ORDER BY id");
    builder
}

fn insert_sql<E: Entity>(entity: &E) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        E::TABLE,
        E::COLUMNS.join(", ")
    ));
    for (index, value) in entity.values().into_iter().enumerate() {
        if index > 0 {
            builder.push(", ");
        }
        push_value(&mut builder, value);
    }
    builder.push(") RETURNING *");
    builder
}

fn update_sql<E: Entity>(entity: &E, id: i64) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", E::TABLE));
    for (index, (column, value)) in E::COLUMNS.iter().zip(entity.values()).enumerate() {
        if index > 0 {
            builder.push(", ");
        }
        builder.push(*column).push(" = ");
        push_value(&mut builder, value);
    }
    builder.push(" WHERE id = ").push_bind(id).push(" RETURNING *");
    builder
}

fn delete_sql<E: Entity>(query: &E::Query) -> RepositoryResult<QueryBuilder<'static, Postgres>> {
    let conditions = query.conditions();
    if conditions.is_empty() {
        return Err(RepositoryError::InvalidQuery(format!(
            "{} requires at least one filter",
            <E::Query as Filter>::DELETE_NAME
        )));
    }

    let mut builder = QueryBuilder::new(format!("DELETE FROM {}", E::TABLE));
    push_conditions(&mut builder, conditions);
    Ok(builder)
}
