//! Lookup tables: currency types and the name-only transaction type tables.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Entity, FieldValue, Filter};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CurrencyType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// ISO-4217 code, e.g. `USD`.
    pub code: String,
    pub name: String,
}

impl CurrencyType {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCurrencyTypes {
    pub id: Option<i64>,
    pub code: Option<String>,
}

impl Entity for CurrencyType {
    type Query = GetCurrencyTypes;

    const NAME: &'static str = "CurrencyType";
    const TABLE: &'static str = "currency_types";
    const COLUMNS: &'static [&'static str] = &["code", "name"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn with_id(self, id: i64) -> Self {
        Self { id: Some(id), ..self }
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Text(self.code.clone()),
            FieldValue::Text(self.name.clone()),
        ]
    }
}

impl Filter for GetCurrencyTypes {
    const GET_NAME: &'static str = "GetCurrencyTypes";
    const DELETE_NAME: &'static str = "DeleteCurrencyType";

    fn conditions(&self) -> Vec<(&'static str, FieldValue)> {
        let mut conditions = Vec::new();
        if let Some(id) = self.id {
            conditions.push(("id", FieldValue::BigInt(id)));
        }
        if let Some(code) = &self.code {
            conditions.push(("code", FieldValue::Text(code.clone())));
        }
        conditions
    }
}

/// Declares a `{ id, name }` lookup record together with its query DTO.
macro_rules! name_lookup {
    ($entity:ident, $query:ident, $table:literal, $get:literal, $delete:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
        pub struct $entity {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub id: Option<i64>,
            pub name: String,
        }

        impl $entity {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    id: None,
                    name: name.into(),
                }
            }
        }

        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $query {
            pub id: Option<i64>,
            pub name: Option<String>,
        }

        impl Entity for $entity {
            type Query = $query;

            const NAME: &'static str = stringify!($entity);
            const TABLE: &'static str = $table;
            const COLUMNS: &'static [&'static str] = &["name"];

            fn id(&self) -> Option<i64> {
                self.id
            }

            fn with_id(self, id: i64) -> Self {
                Self { id: Some(id), ..self }
            }

            fn values(&self) -> Vec<FieldValue> {
                vec![FieldValue::Text(self.name.clone())]
            }
        }

        impl Filter for $query {
            const GET_NAME: &'static str = $get;
            const DELETE_NAME: &'static str = $delete;

            fn conditions(&self) -> Vec<(&'static str, FieldValue)> {
                let mut conditions = Vec::new();
                if let Some(id) = self.id {
                    conditions.push(("id", FieldValue::BigInt(id)));
                }
                if let Some(name) = &self.name {
                    conditions.push(("name", FieldValue::Text(name.clone())));
                }
                conditions
            }
        }
    };
}

name_lookup!(
    TransactionType,
    GetTransactionTypes,
    "transaction_types",
    "GetTransactionTypes",
    "DeleteTransactionType"
);

name_lookup!(
    TransactionStatusType,
    GetTransactionStatusTypes,
    "transaction_status_types",
    "GetTransactionStatusTypes",
    "DeleteTransactionStatusType"
);

name_lookup!(
    TransactionNotificationStatusType,
    GetTransactionNotificationStatusTypes,
    "transaction_notification_status_types",
    "GetTransactionNotificationStatusTypes",
    "DeleteTransactionNotificationStatusType"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_query_conditions() {
        let query = GetCurrencyTypes {
            id: None,
            code: Some("USD".to_string()),
        };
        assert_eq!(
            query.conditions(),
            vec![("code", FieldValue::Text("USD".to_string()))]
        );
        assert!(GetCurrencyTypes::default().conditions().is_empty());
    }

    #[test]
    fn test_query_matches_by_id_and_name() {
        let row = TransactionType::new("AuthorizeAndCapture").with_id(1);

        let by_id = GetTransactionTypes {
            id: Some(1),
            name: None,
        };
        let by_other_name = GetTransactionTypes {
            id: Some(1),
            name: Some("Void".to_string()),
        };

        assert!(by_id.matches(&row));
        assert!(!by_other_name.matches(&row));
        assert!(GetTransactionTypes::default().matches(&row));
    }

    #[test]
    fn test_id_omitted_from_json_until_assigned() {
        let json = serde_json::to_value(CurrencyType::new("USD", "US Dollar")).unwrap();
        assert!(json.get("id").is_none());

        let json = serde_json::to_value(CurrencyType::new("USD", "US Dollar").with_id(7)).unwrap();
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn test_dto_names() {
        assert_eq!(TransactionNotificationStatusType::NAME, "TransactionNotificationStatusType");
        assert_eq!(
            GetTransactionStatusTypes::DELETE_NAME,
            "DeleteTransactionStatusType"
        );
    }
}
