use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::UserRole;

/// Message payload delivered to recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Opaque key/value payload for client-side routing
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Attach a routing payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Lifecycle status of a persisted notification.
///
/// Dispatch creates `Unread` rows and performs the `Unread -> Read`
/// transition. `Offered` and `Rejected` belong to other workflows and are
/// preserved untouched by dispatch logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Unread,
    Read,
    Offered,
    Rejected,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Read => "read",
            NotificationStatus::Offered => "offered",
            NotificationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unread" => Some(NotificationStatus::Unread),
            "read" => Some(NotificationStatus::Read),
            "offered" => Some(NotificationStatus::Offered),
            "rejected" => Some(NotificationStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted notification row: one per (recipient, message) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Assigned at persistence time
    pub id: Uuid,
    pub recipient_id: String,
    /// Optional association to a business entity
    pub service_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on the first transition to `read`
    pub read_at: Option<DateTime<Utc>>,
}

/// Insert payload for one notification row.
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// Caller-supplied idempotency token; replaying an insert with a key that
    /// already has a row returns that row instead of creating a duplicate.
    pub dispatch_key: Uuid,
    pub recipient_id: String,
    pub service_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub status: NotificationStatus,
}

impl NewNotification {
    /// Build an insert payload for one recipient of a message.
    pub fn from_message(
        recipient_id: impl Into<String>,
        message: &PushMessage,
        service_id: Option<Uuid>,
    ) -> Self {
        Self {
            dispatch_key: Uuid::new_v4(),
            recipient_id: recipient_id.into(),
            service_id,
            title: message.title.clone(),
            body: message.body.clone(),
            data: message.data.clone(),
            status: NotificationStatus::Unread,
        }
    }

    /// Reuse a dispatch key from an earlier attempt, for idempotent retries.
    pub fn with_dispatch_key(mut self, key: Uuid) -> Self {
        self.dispatch_key = key;
        self
    }
}

/// Declarative description of who should receive a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum NotificationTarget {
    /// A single recipient
    Individual(String),
    /// Every active user of a role
    Role(UserRole),
    /// Every active technician whose work-category set intersects the given ids
    Categories(Vec<String>),
    /// An explicit recipient list
    Users(Vec<String>),
}

impl NotificationTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationTarget::Individual(_) => "individual",
            NotificationTarget::Role(_) => "role",
            NotificationTarget::Categories(_) => "categories",
            NotificationTarget::Users(_) => "users",
        }
    }
}

/// Delivery path that produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    /// Server-side procedure that records and dispatches in one call
    Primary,
    /// Explicit token lookup plus a direct gateway call
    Fallback,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Primary => "primary",
            DeliveryChannel::Fallback => "fallback",
        }
    }
}

impl fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient record of a push attempt. Ephemeral: lives only in the
/// response of a dispatch call.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub recipient_id: String,
    pub channel: DeliveryChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(recipient_id: impl Into<String>, channel: DeliveryChannel) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            channel,
            error: None,
        }
    }

    pub fn failed(
        recipient_id: impl Into<String>,
        channel: DeliveryChannel,
        error: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            channel,
            error: Some(error.into()),
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}
