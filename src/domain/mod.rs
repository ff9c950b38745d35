//! Domain records and their query DTOs.
//! Framework-agnostic apart from the row mapping the Postgres adapter needs.

pub mod lookup;
pub mod transaction;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::postgres::PgRow;
use std::fmt::Debug;

pub use lookup::{
    CurrencyType, GetCurrencyTypes, GetTransactionNotificationStatusTypes,
    GetTransactionStatusTypes, GetTransactionTypes, TransactionNotificationStatusType,
    TransactionStatusType, TransactionType,
};
pub use transaction::{GetTransactions, Transaction, TransactionStatusCode, TransactionTypeCode};

/// A single column value, used for filters and for writing rows.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    BigInt(i64),
    Text(String),
    Decimal(BigDecimal),
    Timestamp(DateTime<Utc>),
}

/// A persisted record. `id` is assigned by the store on creation.
pub trait Entity:
    Clone
    + Debug
    + Send
    + Sync
    + Unpin
    + Serialize
    + DeserializeOwned
    + for<'r> sqlx::FromRow<'r, PgRow>
    + 'static
{
    type Query: Filter;

    /// DTO type name; also names the message queues.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Writable columns, in the order `values` yields them.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Option<i64>;
    fn with_id(self, id: i64) -> Self;
    fn values(&self) -> Vec<FieldValue>;

    fn value_of(&self, column: &str) -> Option<FieldValue> {
        if column == "id" {
            return self.id().map(FieldValue::BigInt);
        }
        Self::COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|index| self.values().into_iter().nth(index))
    }
}

/// A Get/Delete query DTO. Present fields are AND-ed equality conditions.
pub trait Filter:
    Clone + Debug + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Name of the Get DTO, e.g. `GetCurrencyTypes`.
    const GET_NAME: &'static str;
    /// Name of the Delete DTO, e.g. `DeleteCurrencyType`.
    const DELETE_NAME: &'static str;

    fn conditions(&self) -> Vec<(&'static str, FieldValue)>;

    fn matches<E: Entity>(&self, entity: &E) -> bool {
        self.conditions()
            .into_iter()
            .all(|(column, value)| entity.value_of(column).as_ref() == Some(&value))
    }
}

/// Body of a `Put<Entity>` message: update an existing row in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PutDto<E: Entity> {
    pub body: E,
}

impl<E: Entity> PutDto<E> {
    pub fn type_name() -> String {
        format!("Put{}", E::NAME)
    }
}
