// File: src/platforms/discord/history.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use twilight_http::error::ErrorType;
use twilight_http::Client as HttpClient;
use twilight_model::channel::{Channel, ChannelType};
use twilight_model::id::marker::{ChannelMarker, MessageMarker};
use twilight_model::id::Id;

use digestbot_common::models::message::ChannelId;

use crate::platforms::discord::{record_from_message, snowflake_at};
use crate::platforms::{HistoryBatch, HistorySource};
use crate::Error;

pub(crate) const PAGE_SIZE: u16 = 100;

/// Reads channel history over the Discord REST API. A forum holds no
/// messages itself; its active threads are listed by `message_channels` and
/// read one by one under their own ids.
pub struct DiscordHistorySource {
    http: Arc<HttpClient>,
    max_pages: usize,
}

impl DiscordHistorySource {
    pub fn new(http: Arc<HttpClient>, max_pages: usize) -> Self {
        Self { http, max_pages: max_pages.max(1) }
    }

    async fn fetch_channel(&self, channel_id: ChannelId) -> Result<Channel, Error> {
        let id = channel_marker(channel_id)?;
        let response = self
            .http
            .channel(id)
            .await
            .map_err(|e| map_http_error(channel_id, e))?;
        response
            .model()
            .await
            .map_err(|e| Error::Platform(format!("Bad channel payload for {channel_id}: {e}")))
    }

    async fn forum_threads(&self, forum: &Channel) -> Result<Vec<Id<ChannelMarker>>, Error> {
        let Some(guild_id) = forum.guild_id else {
            return Ok(Vec::new());
        };
        let response = self
            .http
            .active_threads(guild_id)
            .await
            .map_err(|e| map_http_error(forum.id.get(), e))?;
        let active = response
            .model()
            .await
            .map_err(|e| Error::Platform(format!("Bad active threads payload: {e}")))?;

        Ok(active
            .threads
            .into_iter()
            .filter(|thread| thread.parent_id == Some(forum.id))
            .map(|thread| thread.id)
            .collect())
    }

    /// Pages forward from `after` until a short page or the page limit.
    async fn fetch_pages(&self, channel_id: ChannelId, after: DateTime<Utc>) -> Result<HistoryBatch, Error> {
        let channel = channel_marker(channel_id)?;
        let mut cursor = Id::<MessageMarker>::new_checked(snowflake_at(after).max(1))
            .ok_or_else(|| Error::Internal("zero snowflake cursor".to_string()))?;
        let mut batch = HistoryBatch { messages: Vec::new(), truncated: true };

        for _ in 0..self.max_pages {
            let response = self
                .http
                .channel_messages(channel)
                .after(cursor)
                .limit(PAGE_SIZE)
                .await
                .map_err(|e| map_http_error(channel_id, e))?;
            let messages = response
                .models()
                .await
                .map_err(|e| Error::Platform(format!("Bad messages payload for {channel}: {e}")))?;

            let count = messages.len();
            if let Some(newest) = messages.iter().map(|m| m.id).max() {
                cursor = newest;
            }
            batch.messages.extend(
                messages
                    .iter()
                    .map(record_from_message)
                    .filter(|m| m.created_at >= after),
            );

            if count < PAGE_SIZE as usize {
                batch.truncated = false;
                break;
            }
        }

        if batch.truncated {
            warn!("Stopped reading channel {} after {} pages", channel, self.max_pages);
        }
        Ok(batch)
    }
}

#[async_trait]
impl HistorySource for DiscordHistorySource {
    async fn message_channels(&self, channel_id: ChannelId) -> Result<Vec<ChannelId>, Error> {
        let channel = self.fetch_channel(channel_id).await?;
        if channel.kind != ChannelType::GuildForum {
            return Ok(vec![channel_id]);
        }
        let threads: Vec<ChannelId> = self
            .forum_threads(&channel)
            .await?
            .into_iter()
            .map(|thread| thread.get())
            .collect();
        debug!("Forum {} has {} active threads", channel_id, threads.len());
        Ok(threads)
    }

    async fn fetch_history(&self, channel_id: ChannelId, after: DateTime<Utc>) -> Result<HistoryBatch, Error> {
        let batch = self.fetch_pages(channel_id, after).await?;
        debug!("Fetched {} messages from channel {} since {}", batch.messages.len(), channel_id, after);
        Ok(batch)
    }
}

pub(crate) fn channel_marker(channel_id: ChannelId) -> Result<Id<ChannelMarker>, Error> {
    Id::new_checked(channel_id).ok_or_else(|| Error::Platform(format!("Invalid channel ID: {channel_id}")))
}

/// Discord answers 403 for channels the bot may not read.
pub(crate) fn map_http_error(channel_id: ChannelId, err: twilight_http::Error) -> Error {
    if let ErrorType::Response { status, .. } = err.kind() {
        if status.get() == 403 {
            return Error::Forbidden(channel_id);
        }
    }
    Error::Platform(format!("Discord request for channel {channel_id} failed: {err}"))
}
