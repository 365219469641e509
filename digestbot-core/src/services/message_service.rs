// File: src/services/message_service.rs

use std::sync::Arc;

use tracing::trace;

use digestbot_common::models::message::{ChannelId, MessageId, MessageRecord};

use crate::cache::ChannelMessageCache;

/// Applies live chat events to the message cache.
///
/// Every handler is synchronous: the cache mutation is complete when the
/// call returns.
pub struct MessageService {
    cache: Arc<ChannelMessageCache>,
}

impl MessageService {
    pub fn new(cache: Arc<ChannelMessageCache>) -> Self {
        Self { cache }
    }

    pub fn on_message_created(&self, channel_id: ChannelId, message: MessageRecord) {
        let id = message.id;
        if self.cache.record(channel_id, message) {
            trace!("Cached message {} in channel {}", id, channel_id);
        }
    }

    pub fn on_message_edited(&self, channel_id: ChannelId, message_id: MessageId, content: &str) {
        if !self.cache.update(channel_id, message_id, content) {
            trace!("Edit for uncached message {} in channel {}", message_id, channel_id);
        }
    }

    pub fn on_message_deleted(&self, channel_id: ChannelId, message_id: MessageId) {
        self.cache.remove(channel_id, message_id);
    }

    pub fn on_messages_bulk_deleted(&self, channel_id: ChannelId, message_ids: &[MessageId]) {
        for id in message_ids {
            self.cache.remove(channel_id, *id);
        }
    }
}
