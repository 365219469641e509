// File: src/cache/message_cache.rs

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};

use digestbot_common::models::message::{ChannelId, MessageId, MessageRecord};

/// Which senders the cache refuses to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderFilter {
    #[default]
    KeepAll,
    /// Skip anything that carries an application id (bots, integrations).
    IgnoreApplications,
}

impl SenderFilter {
    fn rejects(&self, message: &MessageRecord) -> bool {
        match self {
            SenderFilter::KeepAll => false,
            SenderFilter::IgnoreApplications => message.is_automated(),
        }
    }
}

/// How long a deleted id is refused by `record`.
pub const TOMBSTONE_TTL_MINUTES: i64 = 15;

/// Config that the ChannelMessageCache will use
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    pub sender_filter: SenderFilter,
}

/// One channel's worth of cached messages.
#[derive(Debug, Default)]
struct ChannelBucket {
    messages: HashMap<MessageId, MessageRecord>,
    /// Start of the oldest history range fetched into this bucket that is
    /// still fully retained.
    hydrated_since: Option<DateTime<Utc>>,
}

impl ChannelBucket {
    fn earliest(&self) -> Option<DateTime<Utc>> {
        self.messages.values().map(|m| m.created_at).min()
    }
}

/// Recent messages per channel, kept in step with live create/edit/delete
/// notifications.
///
/// Every method is synchronous and releases its shard lock before
/// returning, so a caller never observes a half-applied mutation and never
/// holds a lock across an `.await`.
pub struct ChannelMessageCache {
    channels: DashMap<ChannelId, ChannelBucket>,
    /// Recently deleted ids and when the delete was seen. A history page
    /// fetched before the delete must not bring the message back.
    tombstones: DashMap<ChannelId, HashMap<MessageId, DateTime<Utc>>>,
    config: CacheConfig,
}

impl ChannelMessageCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            channels: DashMap::new(),
            tombstones: DashMap::new(),
            config,
        }
    }

    /// Inserts `message` unless a record with the same id is already cached
    /// for this channel, the id was deleted recently, or the sender filter
    /// rejects it. Returns whether the record was inserted.
    pub fn record(&self, channel_id: ChannelId, message: MessageRecord) -> bool {
        if self.config.sender_filter.rejects(&message) {
            debug!(
                "Ignoring message {} in channel {} from application {:?}",
                message.id, channel_id, message.application_id
            );
            return false;
        }
        if self.was_deleted(channel_id, message.id) {
            trace!("Message {} in channel {} was deleted, not recording", message.id, channel_id);
            return false;
        }

        let mut bucket = self.channels.entry(channel_id).or_default();
        if bucket.messages.contains_key(&message.id) {
            trace!("Message {} already cached for channel {}", message.id, channel_id);
            return false;
        }
        bucket.messages.insert(message.id, message);
        true
    }

    /// Replaces the content of a cached message. Unknown channels or ids are
    /// ignored; this never creates a record.
    pub fn update(&self, channel_id: ChannelId, message_id: MessageId, new_content: &str) -> bool {
        let Some(mut bucket) = self.channels.get_mut(&channel_id) else {
            return false;
        };
        match bucket.messages.get_mut(&message_id) {
            Some(existing) => {
                existing.content = new_content.to_string();
                true
            }
            None => false,
        }
    }

    /// Deletes a cached message if present, and refuses the id for
    /// [`TOMBSTONE_TTL_MINUTES`] so an in-flight hydration cannot restore it.
    pub fn remove(&self, channel_id: ChannelId, message_id: MessageId) -> bool {
        self.tombstones
            .entry(channel_id)
            .or_default()
            .insert(message_id, Utc::now());
        self.channels
            .get_mut(&channel_id)
            .map(|mut bucket| bucket.messages.remove(&message_id).is_some())
            .unwrap_or(false)
    }

    fn was_deleted(&self, channel_id: ChannelId, message_id: MessageId) -> bool {
        self.tombstones
            .get(&channel_id)
            .is_some_and(|ids| ids.contains_key(&message_id))
    }

    /// The whole bucket for `channel_id`, in no particular order and NOT
    /// filtered by time. Callers that need a window must filter themselves.
    pub fn get_all(&self, channel_id: ChannelId) -> Vec<MessageRecord> {
        self.channels
            .get(&channel_id)
            .map(|bucket| bucket.messages.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, channel_id: ChannelId) -> usize {
        self.channels
            .get(&channel_id)
            .map(|bucket| bucket.messages.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, channel_id: ChannelId) -> bool {
        self.len(channel_id) == 0
    }

    /// Whether a bucket exists for the channel, even an empty one.
    pub fn has_channel(&self, channel_id: ChannelId) -> bool {
        self.channels.contains_key(&channel_id)
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|entry| *entry.key()).collect()
    }

    pub fn total_messages(&self) -> usize {
        self.channels.iter().map(|entry| entry.messages.len()).sum()
    }

    pub fn earliest(&self, channel_id: ChannelId) -> Option<DateTime<Utc>> {
        self.channels.get(&channel_id).and_then(|bucket| bucket.earliest())
    }

    /// True when the retained history for the channel provably reaches back
    /// to `at`: the bucket is non-empty and either its oldest record or its
    /// last hydrated range starts at or before `at`.
    pub fn covers(&self, channel_id: ChannelId, at: DateTime<Utc>) -> bool {
        let Some(bucket) = self.channels.get(&channel_id) else {
            return false;
        };
        let Some(earliest) = bucket.earliest() else {
            return false;
        };
        earliest <= at || bucket.hydrated_since.is_some_and(|since| since <= at)
    }

    /// Remembers that history from `since` onwards has been fetched into an
    /// existing bucket. Does not create buckets.
    pub fn mark_hydrated(&self, channel_id: ChannelId, since: DateTime<Utc>) {
        if let Some(mut bucket) = self.channels.get_mut(&channel_id) {
            bucket.hydrated_since = Some(match bucket.hydrated_since {
                Some(existing) => existing.min(since),
                None => since,
            });
        }
    }

    /// Drops every record created before `now - max_age`. Buckets are kept
    /// even when they end up empty. Returns the number of records removed.
    pub fn prune(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - max_age;
        debug!("Pruning summariser cache messages older than {}", cutoff);

        let mut removed = 0;
        for mut entry in self.channels.iter_mut() {
            let bucket = entry.value_mut();
            let before = bucket.messages.len();
            bucket.messages.retain(|_, m| m.created_at >= cutoff);
            removed += before - bucket.messages.len();

            // Anything older than the cutoff is gone now, so the hydrated
            // range can no longer vouch for it.
            if let Some(since) = bucket.hydrated_since {
                if since < cutoff {
                    bucket.hydrated_since = Some(cutoff);
                }
            }
        }

        let tombstone_cutoff = now - Duration::minutes(TOMBSTONE_TTL_MINUTES);
        self.tombstones.retain(|_, ids| {
            ids.retain(|_, deleted_at| *deleted_at >= tombstone_cutoff);
            !ids.is_empty()
        });
        removed
    }

    pub fn clear_channel(&self, channel_id: ChannelId) {
        self.channels.remove(&channel_id);
        self.tombstones.remove(&channel_id);
    }

    pub fn clear_all(&self) {
        self.channels.clear();
        self.tombstones.clear();
    }
}

impl Default for ChannelMessageCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: MessageId, created_at: DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            id,
            author_name: format!("user{id}"),
            display_name: format!("User {id}"),
            content: format!("message {id}"),
            created_at,
            application_id: None,
        }
    }

    #[test]
    fn prune_clamps_hydrated_range() {
        let now = Utc::now();
        let cache = ChannelMessageCache::default();
        cache.record(1, message(1, now - Duration::hours(2)));
        cache.mark_hydrated(1, now - Duration::hours(48));
        assert!(cache.covers(1, now - Duration::hours(40)));

        cache.prune(Duration::hours(24), now);
        assert!(!cache.covers(1, now - Duration::hours(40)));
        assert!(cache.covers(1, now - Duration::hours(24)));
    }

    #[test]
    fn mark_hydrated_keeps_the_older_start() {
        let now = Utc::now();
        let cache = ChannelMessageCache::default();
        cache.record(1, message(1, now));
        cache.mark_hydrated(1, now - Duration::hours(10));
        cache.mark_hydrated(1, now - Duration::hours(5));
        assert!(cache.covers(1, now - Duration::hours(10)));
    }

    #[test]
    fn mark_hydrated_does_not_create_buckets() {
        let cache = ChannelMessageCache::default();
        cache.mark_hydrated(7, Utc::now());
        assert!(!cache.has_channel(7));
    }

    #[test]
    fn deleted_ids_are_not_recorded_again() {
        let now = Utc::now();
        let cache = ChannelMessageCache::default();
        cache.record(1, message(1, now));
        assert!(cache.remove(1, 1));

        assert!(!cache.record(1, message(1, now)));
        assert!(cache.is_empty(1));
        assert!(cache.record(2, message(1, now)));
    }

    #[test]
    fn tombstones_expire_on_prune() {
        let now = Utc::now();
        let cache = ChannelMessageCache::default();
        cache.remove(1, 1);

        cache.prune(Duration::days(7), now + Duration::minutes(TOMBSTONE_TTL_MINUTES + 1));
        assert!(cache.record(1, message(1, now)));
    }

    #[test]
    fn automated_senders_are_skipped_when_configured() {
        let cache = ChannelMessageCache::new(CacheConfig {
            sender_filter: SenderFilter::IgnoreApplications,
        });
        let mut bot = message(1, Utc::now());
        bot.application_id = Some(42);
        assert!(!cache.record(5, bot));
        assert!(cache.record(5, message(2, Utc::now())));
        assert_eq!(cache.len(5), 1);
    }
}
