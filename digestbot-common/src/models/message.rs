use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ChannelId = u64;
pub type MessageId = u64;
pub type UserId = u64;

/// Single cached chat message. Everything except `content` is fixed once
/// the message exists; edits only ever touch `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub author_name: String,
    pub display_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Present when an application (bot, webhook integration) sent the message.
    #[serde(default)]
    pub application_id: Option<u64>,
}

impl MessageRecord {
    pub fn is_automated(&self) -> bool {
        self.application_id.is_some()
    }
}

/// The channel a request or ledger entry refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: ChannelId,
    pub name: String,
}

/// The user who asked for a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
    pub display_name: String,
}
