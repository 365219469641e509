// File: src/platforms/discord/janitor.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use twilight_http::Client as HttpClient;
use twilight_model::id::marker::MessageMarker;
use twilight_model::id::Id;

use digestbot_common::models::message::{ChannelId, MessageId, MessageRecord};

use crate::platforms::discord::history::{channel_marker, map_http_error, PAGE_SIZE};
use crate::platforms::discord::{record_from_message, snowflake_at};
use crate::platforms::MessageJanitor;
use crate::Error;

/// Pages backwards through a channel and deletes messages over REST.
pub struct DiscordJanitor {
    http: Arc<HttpClient>,
    max_pages: usize,
}

impl DiscordJanitor {
    pub fn new(http: Arc<HttpClient>, max_pages: usize) -> Self {
        Self { http, max_pages: max_pages.max(1) }
    }
}

#[async_trait]
impl MessageJanitor for DiscordJanitor {
    async fn messages_before(&self, channel_id: ChannelId, before: DateTime<Utc>) -> Result<Vec<MessageRecord>, Error> {
        let channel = channel_marker(channel_id)?;
        let mut cursor = Id::<MessageMarker>::new_checked(snowflake_at(before).max(1))
            .ok_or_else(|| Error::Internal("zero snowflake cursor".to_string()))?;
        let mut records = Vec::new();

        for page in 0..self.max_pages {
            let messages = self
                .http
                .channel_messages(channel)
                .before(cursor)
                .limit(PAGE_SIZE)
                .await
                .map_err(|e| map_http_error(channel_id, e))?
                .models()
                .await
                .map_err(|e| Error::Platform(format!("Bad messages payload for {channel}: {e}")))?;

            let count = messages.len();
            let Some(oldest) = messages.iter().map(|m| m.id).min() else {
                break;
            };
            cursor = oldest;
            records.extend(messages.iter().map(record_from_message));

            if count < PAGE_SIZE as usize {
                break;
            }
            if page + 1 == self.max_pages {
                warn!("Stopped listing old messages in channel {} after {} pages", channel_id, self.max_pages);
            }
        }

        debug!("Found {} messages before {} in channel {}", records.len(), before, channel_id);
        Ok(records)
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), Error> {
        let channel = channel_marker(channel_id)?;
        let message = Id::new_checked(message_id)
            .ok_or_else(|| Error::Platform(format!("Invalid message ID: {message_id}")))?;
        self.http
            .delete_message(channel, message)
            .await
            .map_err(|e| map_http_error(channel_id, e))?;
        Ok(())
    }
}
