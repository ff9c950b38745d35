//! Message-queue transport: one inbound queue per DTO type, replies to the
//! caller's `reply_to` queue.

pub mod broker;
pub mod client;
pub mod registry;
pub mod server;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::Credentials;
use crate::dispatch::{ErrorEnvelope, Reply};

pub use broker::{Broker, InMemoryBroker, MqError, RedisBroker};
pub use client::MqClient;
pub use registry::{HandlerRegistry, Registration};
pub use server::MqServer;

const QUEUE_PREFIX: &str = "mq:";
const INBOUND_SUFFIX: &str = ".inq";
const OUTBOUND_SUFFIX: &str = ".outq";
const DEAD_LETTER_SUFFIX: &str = ".dlq";

/// `mq:<Type>.inq`
pub fn inbound_queue(type_name: &str) -> String {
    format!("{}{}{}", QUEUE_PREFIX, type_name, INBOUND_SUFFIX)
}

/// `mq:<Type>.outq`, where replies go when the caller named no `reply_to`.
pub fn outbound_queue(type_name: &str) -> String {
    format!("{}{}{}", QUEUE_PREFIX, type_name, OUTBOUND_SUFFIX)
}

/// Where undecodable payloads popped from `queue` are parked:
/// `mq:<Type>.inq` maps to `mq:<Type>.dlq`.
pub fn dead_letter_queue(queue: &str) -> String {
    format!(
        "{}{}",
        queue.strip_suffix(INBOUND_SUFFIX).unwrap_or(queue),
        DEAD_LETTER_SUFFIX
    )
}

/// DTO type name of an inbound queue, if it is one.
pub fn type_name_of(queue: &str) -> Option<&str> {
    queue
        .strip_prefix(QUEUE_PREFIX)
        .and_then(|rest| rest.strip_suffix(INBOUND_SUFFIX))
}

/// Unique private reply queue for one request/reply exchange.
pub fn unique_reply_queue(client: &str) -> String {
    format!("{}{}:{}", QUEUE_PREFIX, client, Uuid::new_v4().simple())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Id of the request this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl Message {
    pub fn new(body: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            body,
            reply_to: None,
            reply_id: None,
            authorization: None,
            session_id: None,
            error: None,
        }
    }

    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.reply_to = Some(queue.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.authorization = credentials.authorization;
        self.session_id = credentials.session_id;
        self
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            authorization: self.authorization.clone(),
            session_id: self.session_id.clone(),
        }
    }

    /// Reply to this message carrying either the result or the error.
    pub fn reply(&self, reply: Reply) -> Message {
        let mut message = match reply {
            Ok(body) => Message::new(body),
            Err(envelope) => {
                let mut message = Message::new(Value::Null);
                message.error = Some(envelope);
                message
            }
        };
        message.reply_id = Some(self.id);
        message
    }

    pub fn is_error_response(&self) -> bool {
        self.error.is_some()
    }

    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queue_names() {
        assert_eq!(inbound_queue("GetCurrencyTypes"), "mq:GetCurrencyTypes.inq");
        assert_eq!(outbound_queue("Transaction"), "mq:Transaction.outq");
        assert_eq!(type_name_of("mq:DeleteTransaction.inq"), Some("DeleteTransaction"));
        assert_eq!(type_name_of("mq:c1:abc"), None);
        assert!(unique_reply_queue("c1").starts_with("mq:c1:"));
        assert_eq!(dead_letter_queue("mq:Transaction.inq"), "mq:Transaction.dlq");
        assert_eq!(dead_letter_queue("mq:c1:abc"), "mq:c1:abc.dlq");
    }

    #[test]
    fn test_reply_carries_request_id() {
        let request = Message::new(json!({})).with_reply_to("mq:c1:1");
        let ok = request.reply(Ok(json!([1, 2, 3])));
        let failed = request.reply(Err(ErrorEnvelope::unauthorized("authentication required")));

        assert_eq!(ok.reply_id, Some(request.id));
        assert!(!ok.is_error_response());
        assert_eq!(ok.body_as::<Vec<i32>>().unwrap(), vec![1, 2, 3]);
        assert!(failed.is_error_response());
        assert_eq!(failed.error.unwrap().status, 401);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let json = serde_json::to_value(Message::new(json!({}))).unwrap();
        assert!(json.get("reply_to").is_none());
        assert!(json.get("authorization").is_none());

        let parsed: Message = serde_json::from_value(json).unwrap();
        assert!(parsed.credentials().is_empty());
    }
}
