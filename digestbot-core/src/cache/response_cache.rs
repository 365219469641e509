// File: src/cache/response_cache.rs

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use digestbot_common::models::message::ChannelId;
use digestbot_common::models::summary::{SummaryCacheEntry, SummaryKey};

/// Generated summaries memoized per (channel, period specifier).
///
/// Expiry is checked on every read, so an expired entry is a miss even if
/// `sweep` has not removed it yet.
#[derive(Default)]
pub struct SummaryResponseCache {
    entries: DashMap<SummaryKey, SummaryCacheEntry>,
}

impl SummaryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel_id: ChannelId, period: &str, now: DateTime<Utc>) -> Option<SummaryCacheEntry> {
        let key = (channel_id, period.to_string());
        self.entries
            .get(&key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value().clone())
    }

    /// Stores `text` until `now + ttl`, replacing any previous entry.
    pub fn put(
        &self,
        channel_id: ChannelId,
        period: &str,
        text: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> SummaryCacheEntry {
        let entry = SummaryCacheEntry {
            channel_id,
            period: period.to_string(),
            text: text.to_string(),
            expires_at: now + ttl,
        };
        self.entries.insert((channel_id, period.to_string()), entry.clone());
        entry
    }

    /// Physically drops expired entries. Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Swept {} expired summary responses", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
