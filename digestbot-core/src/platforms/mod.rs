// File: src/platforms/mod.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use digestbot_common::models::message::{ChannelId, MessageId, MessageRecord};
use crate::Error;
use crate::summarizer::UsageReport;

/// Messages read from one channel's history.
#[derive(Debug, Clone, Default)]
pub struct HistoryBatch {
    pub messages: Vec<MessageRecord>,
    /// Reading stopped at the page limit before reaching the newest message.
    pub truncated: bool,
}

impl From<Vec<MessageRecord>> for HistoryBatch {
    fn from(messages: Vec<MessageRecord>) -> Self {
        Self { messages, truncated: false }
    }
}

/// Read access to a channel's stored history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// The channels that hold messages for `channel_id`: the channel itself,
    /// or each active thread of a forum.
    async fn message_channels(&self, channel_id: ChannelId) -> Result<Vec<ChannelId>, Error>;

    /// Every message in `channel_id` created at or after `after`, in any order.
    async fn fetch_history(
        &self,
        channel_id: ChannelId,
        after: DateTime<Utc>,
    ) -> Result<HistoryBatch, Error>;
}

/// Finds and deletes aged-out messages for the auto-pruner.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageJanitor: Send + Sync {
    /// Messages in `channel_id` created before `before`, newest first.
    async fn messages_before(
        &self,
        channel_id: ChannelId,
        before: DateTime<Utc>,
    ) -> Result<Vec<MessageRecord>, Error>;

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), Error>;
}

/// Side channel for moderators (usage and cost reports).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, report: &UsageReport) -> Result<(), Error>;
}

/// One outgoing reply to whoever invoked a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub title: Option<String>,
    pub body: String,
    pub ephemeral: bool,
}

impl Reply {
    pub fn plain(body: impl Into<String>, ephemeral: bool) -> Self {
        Self { title: None, body: body.into(), ephemeral }
    }
}

/// Delivers replies for a single command invocation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandReply: Send + Sync {
    async fn send_reply(&self, reply: Reply) -> Result<(), Error>;
}

/// Posts a message to a fixed channel (daily digest announcements).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, reply: Reply) -> Result<(), Error>;
}

// Re-export submodules
pub mod discord;
