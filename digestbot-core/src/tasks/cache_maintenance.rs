// digestbot-core/src/tasks/cache_maintenance.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::cache::{ChannelMessageCache, SummaryResponseCache};

/// One maintenance pass. Returns `(messages_pruned, responses_swept)`.
pub fn run_cache_maintenance(
    messages: &ChannelMessageCache,
    responses: &SummaryResponseCache,
    max_age: chrono::Duration,
    now: DateTime<Utc>,
) -> (usize, usize) {
    let pruned = messages.prune(max_age, now);
    let swept = responses.sweep(now);
    debug!(
        "Cache maintenance: pruned {} messages, swept {} responses, {} messages remain",
        pruned,
        swept,
        messages.total_messages()
    );
    (pruned, swept)
}

/// Spawns a background task that periodically prunes old messages and
/// expired summaries.
pub fn spawn_cache_prune_task(
    messages: Arc<ChannelMessageCache>,
    responses: Arc<SummaryResponseCache>,
    max_age: chrono::Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            run_cache_maintenance(&messages, &responses, max_age, Utc::now());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use digestbot_common::models::message::MessageRecord;

    fn message(id: u64, created_at: DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            id,
            author_name: "a".to_string(),
            display_name: "A".to_string(),
            content: "x".to_string(),
            created_at,
            application_id: None,
        }
    }

    #[test]
    fn prunes_old_messages_and_sweeps_expired_responses() {
        let now = Utc::now();
        let messages = ChannelMessageCache::default();
        messages.record(1, message(1, now - ChronoDuration::hours(48)));
        messages.record(1, message(2, now - ChronoDuration::hours(1)));

        let responses = SummaryResponseCache::new();
        responses.put(1, "24h", "old", ChronoDuration::seconds(10), now - ChronoDuration::minutes(5));
        responses.put(1, "7d", "fresh", ChronoDuration::hours(1), now);

        let (pruned, swept) = run_cache_maintenance(&messages, &responses, ChronoDuration::hours(24), now);

        assert_eq!((pruned, swept), (1, 1));
        assert_eq!(messages.len(1), 1);
        assert_eq!(responses.len(), 1);
    }
}
