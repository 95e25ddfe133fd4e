//! Inter-agent message format.
//!
//! A `Message` is an immutable value created by a sender immediately before
//! dispatch. The payload is a tagged union per message type, serialized with
//! the wire-level field names `message_type` and `payload` so workers see the
//! same shape as the dynamic-dict contract they were written against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::Result;

/// Opaque response map returned by agent handlers
pub type Response = serde_json::Map<String, Value>;

/// JSON object used for open payload fields and metadata
pub type JsonMap = serde_json::Map<String, Value>;

/// Types of messages agents can exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    RequestData,
    ResponseData,
    TaskComplete,
    TaskFailed,
    NeedsHelp,
    StatusUpdate,
    Notification,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::RequestData => "request_data",
            MessageType::ResponseData => "response_data",
            MessageType::TaskComplete => "task_complete",
            MessageType::TaskFailed => "task_failed",
            MessageType::NeedsHelp => "needs_help",
            MessageType::StatusUpdate => "status_update",
            MessageType::Notification => "notification",
        }
    }
}

/// Typed payload, one variant per message type.
///
/// Adjacent tagging keeps the wire fields `message_type` + `payload` intact
/// for the out-of-scope worker contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", content = "payload", rename_all = "snake_case")]
pub enum MessageBody {
    RequestData {
        action: String,
        #[serde(flatten)]
        params: JsonMap,
    },
    ResponseData {
        #[serde(flatten)]
        data: JsonMap,
    },
    TaskComplete {
        #[serde(flatten)]
        result: JsonMap,
    },
    TaskFailed {
        error: String,
    },
    NeedsHelp {
        reason: String,
    },
    StatusUpdate {
        status: String,
    },
    Notification {
        #[serde(flatten)]
        info: JsonMap,
    },
}

impl MessageBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::RequestData { .. } => MessageType::RequestData,
            MessageBody::ResponseData { .. } => MessageType::ResponseData,
            MessageBody::TaskComplete { .. } => MessageType::TaskComplete,
            MessageBody::TaskFailed { .. } => MessageType::TaskFailed,
            MessageBody::NeedsHelp { .. } => MessageType::NeedsHelp,
            MessageBody::StatusUpdate { .. } => MessageType::StatusUpdate,
            MessageBody::Notification { .. } => MessageType::Notification,
        }
    }
}

/// Standardized message format for agent-to-agent communication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub from_agent: String,
    pub to_agent: String,

    #[serde(flatten)]
    pub body: MessageBody,

    #[serde(default)]
    pub requires_response: bool,

    /// Links a request to its eventual response.
    /// Invariant: present iff `requires_response`, unless explicitly supplied.
    #[serde(default)]
    pub correlation_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub metadata: JsonMap,
}

impl Message {
    /// Recipient marker meaning "all other registered agents"
    pub const BROADCAST: &'static str = "broadcast";

    /// Create a message, generating a correlation id when a response is required
    pub fn new(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        body: MessageBody,
        requires_response: bool,
    ) -> Self {
        Self {
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            body,
            requires_response,
            correlation_id: requires_response.then(Uuid::new_v4),
            timestamp: Utc::now(),
            metadata: JsonMap::new(),
        }
    }

    /// Shorthand for a `RequestData` message awaiting a response
    pub fn request(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        action: impl Into<String>,
        params: JsonMap,
    ) -> Self {
        Self::new(
            from_agent,
            to_agent,
            MessageBody::RequestData {
                action: action.into(),
                params,
            },
            true,
        )
    }

    /// Override the generated correlation id (e.g. when replying)
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Attach a metadata entry (audit trails, tracing context)
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    pub fn is_broadcast(&self) -> bool {
        self.to_agent == Self::BROADCAST
    }

    /// Copy of this message addressed to a single broadcast recipient.
    /// Keeps the correlation id so responses stay linkable.
    pub(crate) fn recipient_copy(&self, to_agent: &str) -> Self {
        Self {
            from_agent: self.from_agent.clone(),
            to_agent: to_agent.to_string(),
            body: self.body.clone(),
            requires_response: self.requires_response,
            correlation_id: self.correlation_id,
            timestamp: Utc::now(),
            metadata: self.metadata.clone(),
        }
    }

    /// Convert to a JSON value with the reference wire field names
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Reconstruct a message from its wire representation
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_body() -> MessageBody {
        let mut params = JsonMap::new();
        params.insert("min_score".to_string(), json!(60));
        MessageBody::RequestData {
            action: "rank_jobs".to_string(),
            params,
        }
    }

    #[test]
    fn test_correlation_id_generated_when_response_required() {
        let msg = Message::new("orchestrator", "matcher", request_body(), true);
        assert!(msg.correlation_id.is_some());
    }

    #[test]
    fn test_no_correlation_id_for_fire_and_forget() {
        let msg = Message::new(
            "orchestrator",
            "tracker",
            MessageBody::Notification {
                info: JsonMap::new(),
            },
            false,
        );
        assert!(msg.correlation_id.is_none());
    }

    #[test]
    fn test_explicit_correlation_id_survives() {
        let id = Uuid::new_v4();
        let msg = Message::new(
            "matcher",
            "orchestrator",
            MessageBody::ResponseData {
                data: JsonMap::new(),
            },
            false,
        )
        .with_correlation_id(id);
        assert_eq!(msg.correlation_id, Some(id));
    }

    #[test]
    fn test_wire_field_names() {
        let msg = Message::new("orchestrator", "scout", request_body(), true);
        let value = msg.to_value().unwrap();

        assert_eq!(value["message_type"], "request_data");
        assert_eq!(value["payload"]["action"], "rank_jobs");
        assert_eq!(value["payload"]["min_score"], 60);
        assert_eq!(value["from_agent"], "orchestrator");
        assert_eq!(value["to_agent"], "scout");
        assert_eq!(value["requires_response"], true);
    }

    #[test]
    fn test_round_trip() {
        let msg = Message::new("orchestrator", "scout", request_body(), true)
            .with_metadata("turn", json!(3));

        let value = msg.to_value().unwrap();
        let restored = Message::from_value(value).unwrap();

        assert_eq!(restored, msg);
        assert_eq!(restored.message_type(), MessageType::RequestData);
    }

    #[test]
    fn test_recipient_copy_keeps_correlation() {
        let msg = Message::new(
            "orchestrator",
            Message::BROADCAST,
            MessageBody::StatusUpdate {
                status: "searching".to_string(),
            },
            true,
        );
        let copy = msg.recipient_copy("scout");

        assert_eq!(copy.to_agent, "scout");
        assert_eq!(copy.correlation_id, msg.correlation_id);
        assert_eq!(copy.body, msg.body);
    }

    #[test]
    fn test_message_type_wire_names() {
        assert_eq!(MessageType::RequestData.as_str(), "request_data");
        assert_eq!(MessageType::TaskFailed.as_str(), "task_failed");

        let parsed: MessageType = serde_json::from_str("\"needs_help\"").unwrap();
        assert_eq!(parsed, MessageType::NeedsHelp);
    }
}
