//! Chat message frame types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound chat message frame.
///
/// Frames arrive in network order, not send order. Consumers must route
/// messages to a conversation by `dialog_id`, never by arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub dialog_id: i64,
    pub content: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An outbound chat message frame.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub dialog_id: i64,
    pub content: String,
}

impl OutgoingMessage {
    pub fn new(dialog_id: i64, content: impl Into<String>) -> Self {
        Self {
            dialog_id,
            content: content.into(),
        }
    }
}
