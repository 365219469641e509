use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use digestbot_common::models::message::ChannelId;

use crate::cache::ChannelMessageCache;
use crate::platforms::HistorySource;
use crate::Error;

/// Result of a coverage check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// The cache already reached back far enough; nothing was fetched.
    AlreadyCovered,
    /// History was fetched; `inserted` of `fetched` records were new.
    Hydrated { fetched: usize, inserted: usize },
}

/// Backfills the message cache from a history source on demand.
pub struct Hydrator {
    cache: Arc<ChannelMessageCache>,
    history: Arc<dyn HistorySource>,
}

impl Hydrator {
    pub fn new(cache: Arc<ChannelMessageCache>, history: Arc<dyn HistorySource>) -> Self {
        Self { cache, history }
    }

    /// Makes sure the cache holds everything in `channel_id` since `since`.
    ///
    /// Fails with `NoMessages` when the bucket is still empty afterwards.
    pub async fn ensure_covered(&self, channel_id: ChannelId, since: DateTime<Utc>) -> Result<Coverage, Error> {
        if self.cache.covers(channel_id, since) {
            debug!("Channel {} already covered since {}", channel_id, since);
            return Ok(Coverage::AlreadyCovered);
        }

        let (fetched, inserted) = self.hydrate(channel_id, since).await?;
        if self.cache.is_empty(channel_id) {
            return Err(Error::NoMessages(channel_id));
        }
        Ok(Coverage::Hydrated { fetched, inserted })
    }

    /// The channels whose buckets hold `channel_id`'s messages (a forum
    /// expands to its active threads).
    pub async fn message_channels(&self, channel_id: ChannelId) -> Result<Vec<ChannelId>, Error> {
        self.history.message_channels(channel_id).await
    }

    /// Unconditionally fetches history since `since` into the cache.
    /// Returns `(fetched, inserted)`.
    ///
    /// A truncated read is recorded but does not count as coverage.
    pub async fn hydrate(&self, channel_id: ChannelId, since: DateTime<Utc>) -> Result<(usize, usize), Error> {
        let batch = self.history.fetch_history(channel_id, since).await?;
        let fetched = batch.messages.len();

        // Live events may have landed while the fetch was suspended; the
        // cache ignores ids it already holds or saw deleted.
        let inserted = batch
            .messages
            .into_iter()
            .filter_map(|m| self.cache.record(channel_id, m).then_some(()))
            .count();
        if batch.truncated {
            warn!("History of channel {} was cut short, coverage since {} not recorded", channel_id, since);
        } else {
            self.cache.mark_hydrated(channel_id, since);
        }

        info!(
            "Hydrated channel {} since {}: {} fetched, {} new",
            channel_id, since, fetched, inserted
        );
        Ok((fetched, inserted))
    }
}
