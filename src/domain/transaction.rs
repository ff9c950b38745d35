//! Payment gateway transaction record.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Entity, FieldValue, Filter};

/// Well-known `transaction_types` ids, as seeded by the migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum TransactionTypeCode {
    AuthorizeAndCapture = 1,
    AuthorizeOnly = 2,
    Capture = 3,
    Credit = 4,
    Void = 5,
}

/// Well-known `transaction_status_types` ids, as seeded by the migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum TransactionStatusCode {
    Pending = 1,
    Approved = 2,
    Declined = 3,
    Error = 4,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub amount: BigDecimal,
    /// Masked card reference, never a full PAN.
    pub card: String,
    pub create_date: DateTime<Utc>,
    pub subscription_id: i64,
    pub gateway_transaction_id: String,
    pub transaction_type_id: i64,
    pub transaction_status_id: i64,
    pub gateway_response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTransactions {
    pub id: Option<i64>,
    pub subscription_id: Option<i64>,
    pub gateway_transaction_id: Option<String>,
    pub transaction_status_id: Option<i64>,
}

impl Entity for Transaction {
    type Query = GetTransactions;

    const NAME: &'static str = "Transaction";
    const TABLE: &'static str = "transactions";
    const COLUMNS: &'static [&'static str] = &[
        "amount",
        "card",
        "create_date",
        "subscription_id",
        "gateway_transaction_id",
        "transaction_type_id",
        "transaction_status_id",
        "gateway_response",
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn with_id(self, id: i64) -> Self {
        Self { id: Some(id), ..self }
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Decimal(self.amount.clone()),
            FieldValue::Text(self.card.clone()),
            FieldValue::Timestamp(self.create_date),
            FieldValue::BigInt(self.subscription_id),
            FieldValue::Text(self.gateway_transaction_id.clone()),
            FieldValue::BigInt(self.transaction_type_id),
            FieldValue::BigInt(self.transaction_status_id),
            FieldValue::Text(self.gateway_response.clone()),
        ]
    }
}

impl Filter for GetTransactions {
    const GET_NAME: &'static str = "GetTransactions";
    const DELETE_NAME: &'static str = "DeleteTransaction";

    fn conditions(&self) -> Vec<(&'static str, FieldValue)> {
        let mut conditions = Vec::new();
        if let Some(id) = self.id {
            conditions.push(("id", FieldValue::BigInt(id)));
        }
        if let Some(subscription_id) = self.subscription_id {
            conditions.push(("subscription_id", FieldValue::BigInt(subscription_id)));
        }
        if let Some(gateway_id) = &self.gateway_transaction_id {
            conditions.push(("gateway_transaction_id", FieldValue::Text(gateway_id.clone())));
        }
        if let Some(status_id) = self.transaction_status_id {
            conditions.push(("transaction_status_id", FieldValue::BigInt(status_id)));
        }
        conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample() -> Transaction {
        Transaction {
            id: None,
            amount: BigDecimal::from_str("10.00").unwrap(),
            card: "XXXXXXXXXX124".to_string(),
            create_date: Utc::now(),
            subscription_id: 101,
            gateway_transaction_id: "123456".to_string(),
            transaction_type_id: TransactionTypeCode::AuthorizeAndCapture as i64,
            transaction_status_id: TransactionStatusCode::Pending as i64,
            gateway_response: "ok".to_string(),
        }
    }

    #[test]
    fn test_values_follow_column_order() {
        let tx = sample();
        assert_eq!(tx.values().len(), Transaction::COLUMNS.len());
        assert_eq!(tx.value_of("subscription_id"), Some(FieldValue::BigInt(101)));
        assert_eq!(tx.value_of("card"), Some(FieldValue::Text("XXXXXXXXXX124".to_string())));
        assert_eq!(tx.value_of("id"), None);
        assert_eq!(tx.value_of("unknown"), None);
    }

    #[test]
    fn test_filter_by_status() {
        let tx = sample().with_id(3);
        let pending = GetTransactions {
            transaction_status_id: Some(TransactionStatusCode::Pending as i64),
            ..Default::default()
        };
        let approved = GetTransactions {
            transaction_status_id: Some(TransactionStatusCode::Approved as i64),
            ..Default::default()
        };

        assert!(pending.matches(&tx));
        assert!(!approved.matches(&tx));
    }

    #[test]
    fn test_amount_serializes_as_decimal_string() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["amount"], "10.00");
        assert_eq!(json["transaction_type_id"], 1);
    }
}
