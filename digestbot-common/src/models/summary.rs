use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::message::ChannelId;

/// Response cache key. The period is kept verbatim, so "24h" and "1d" are
/// different keys.
pub type SummaryKey = (ChannelId, String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCacheEntry {
    pub channel_id: ChannelId,
    pub period: String,
    pub text: String,
    pub expires_at: DateTime<Utc>,
}

impl SummaryCacheEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        if self.is_live(now) {
            self.expires_at - now
        } else {
            Duration::zero()
        }
    }
}

/// Token accounting returned by the model for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}
