use std::sync::Arc;

use chrono::{DateTime, Days, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use digestbot_common::models::message::ChannelRef;

use crate::platforms::{Announcer, Reply};
use crate::services::digest_service::SUMMARY_TITLE;
use crate::summarizer::SummarizerService;
use crate::utils::split_text_max_length;
use crate::Error;

pub const DIGEST_INTRO: &str = "Here is the summary of the last 24 hours of messages. \
You can do this at any time in any channel using the `/digest` command.";

/// The first instant strictly after `now` at which the local wall clock in
/// `tz` reads `at`. A time skipped by a DST change runs an hour later.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    for offset in 0..=2 {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        let local = date.and_time(at);
        let candidate = tz
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest());
        if let Some(candidate) = candidate.map(|c| c.with_timezone(&Utc)) {
            if candidate > now {
                return candidate;
            }
        }
    }
    now + Duration::days(1)
}

/// Posts one summary of the last day across a fixed set of channels.
pub struct DailyDigest {
    summarizer: Arc<SummarizerService>,
    announcer: Arc<dyn Announcer>,
    channels: Vec<ChannelRef>,
    max_reply_length: usize,
}

impl DailyDigest {
    pub fn new(
        summarizer: Arc<SummarizerService>,
        announcer: Arc<dyn Announcer>,
        channels: Vec<ChannelRef>,
        max_reply_length: usize,
    ) -> Self {
        Self { summarizer, announcer, channels, max_reply_length }
    }

    /// Returns whether anything was posted.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<bool, Error> {
        let since = now - Duration::hours(24);
        let Some(summary) = self.summarizer.digest(&self.channels, since).await? else {
            return Ok(false);
        };

        self.announcer.announce(Reply::plain(DIGEST_INTRO, false)).await?;
        for (idx, body) in split_text_max_length(&summary.text, self.max_reply_length)
            .into_iter()
            .enumerate()
        {
            self.announcer
                .announce(Reply {
                    title: (idx == 0).then(|| SUMMARY_TITLE.to_string()),
                    body,
                    ephemeral: false,
                })
                .await?;
        }

        info!(
            "Posted daily digest of {} messages ({} tokens, ${:.6})",
            summary.message_count, summary.usage.total_tokens, summary.cost
        );
        Ok(true)
    }
}

/// Runs `digest` every day at local time `at` in `tz`.
pub fn spawn_daily_digest_task(digest: Arc<DailyDigest>, at: NaiveTime, tz: Tz) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, at, tz);
            info!("Next daily digest at {} ({})", next.with_timezone(&tz), tz);

            let wait = (next - now).to_std().unwrap_or_default();
            sleep(wait).await;

            match digest.run(Utc::now()).await {
                Ok(true) => {}
                Ok(false) => warn!("Daily digest skipped: nothing to summarise"),
                Err(e) => error!("Daily digest failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ChannelMessageCache, SummaryResponseCache};
    use crate::config::SummarizerConfig;
    use crate::platforms::{HistoryBatch, MockAnnouncer, MockHistorySource};
    use crate::repositories::InMemoryVariableStore;
    use async_trait::async_trait;
    use digestbot_ai::{AiClient, CompletionRequest, CompletionResponse, ModelProvider, Provider, TokenUsage};
    use digestbot_common::models::message::MessageRecord;

    #[test]
    fn next_run_is_later_today_or_tomorrow() {
        let tz = chrono_tz::Australia::Sydney;
        let at = NaiveTime::from_hms_opt(18, 0, 0).unwrap();

        // 2025-01-10 05:00 UTC is 16:00 in Sydney (UTC+11).
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 5, 0, 0).unwrap();
        assert_eq!(next_run_after(now, at, tz), Utc.with_ymd_and_hms(2025, 1, 10, 7, 0, 0).unwrap());

        // Exactly on time schedules the following day.
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 7, 0, 0).unwrap();
        assert_eq!(next_run_after(now, at, tz), Utc.with_ymd_and_hms(2025, 1, 11, 7, 0, 0).unwrap());
    }

    #[test]
    fn skipped_local_time_runs_an_hour_later() {
        let tz = chrono_tz::Europe::London;
        let at = NaiveTime::from_hms_opt(1, 30, 0).unwrap();
        // Clocks jump from 01:00 to 02:00 GMT on 2025-03-30.
        let now = Utc.with_ymd_and_hms(2025, 3, 29, 12, 0, 0).unwrap();
        assert_eq!(next_run_after(now, at, tz), Utc.with_ymd_and_hms(2025, 3, 30, 1, 30, 0).unwrap());
    }

    struct Canned;

    #[async_trait]
    impl ModelProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
            // prefix + messages + suffix
            Ok(CompletionResponse {
                text: format!("{} messages", request.messages.len() - 2),
                usage: TokenUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 },
            })
        }
    }

    async fn digest_with(history: MockHistorySource, announcer: MockAnnouncer) -> DailyDigest {
        let provider = Provider::new();
        provider.register(Canned).await;
        let summarizer = SummarizerService::new(
            Arc::new(ChannelMessageCache::default()),
            Arc::new(SummaryResponseCache::new()),
            Arc::new(history),
            Arc::new(AiClient::new(Arc::new(provider), "canned")),
            Arc::new(InMemoryVariableStore::new()),
            SummarizerConfig::default(),
        );
        let channels = vec![
            ChannelRef { id: 1, name: "one".to_string() },
            ChannelRef { id: 2, name: "two".to_string() },
        ];
        DailyDigest::new(Arc::new(summarizer), Arc::new(announcer), channels, 4096)
    }

    #[tokio::test]
    async fn only_messages_from_the_last_day_are_summarised() {
        let now = Utc::now();
        let mut history = MockHistorySource::new();
        history.expect_message_channels().returning(|id| Ok(vec![id]));
        history.expect_fetch_history().returning(move |channel_id, _| {
            Ok(vec![
                MessageRecord {
                    id: channel_id * 10,
                    author_name: "a".to_string(),
                    display_name: "A".to_string(),
                    content: "recent".to_string(),
                    created_at: now - Duration::hours(2),
                    application_id: None,
                },
                MessageRecord {
                    id: channel_id * 10 + 1,
                    author_name: "a".to_string(),
                    display_name: "A".to_string(),
                    content: "old".to_string(),
                    created_at: now - Duration::hours(30),
                    application_id: None,
                },
            ]
            .into())
        });

        let mut announcer = MockAnnouncer::new();
        announcer
            .expect_announce()
            .withf(|r| r.body == DIGEST_INTRO)
            .times(1)
            .returning(|_| Ok(()));
        announcer
            .expect_announce()
            .withf(|r| r.title.as_deref() == Some(SUMMARY_TITLE) && r.body == "2 messages")
            .times(1)
            .returning(|_| Ok(()));

        let digest = digest_with(history, announcer).await;
        assert!(digest.run(now).await.unwrap());
    }

    #[tokio::test]
    async fn forums_are_read_through_their_threads() {
        let now = Utc::now();
        let mut history = MockHistorySource::new();
        history.expect_message_channels().returning(|id| match id {
            1 => Ok(vec![101, 102]),
            _ => Err(Error::Forbidden(id)),
        });
        history
            .expect_fetch_history()
            .withf(|channel_id, _| *channel_id == 101 || *channel_id == 102)
            .times(2)
            .returning(move |channel_id, _| {
                Ok(vec![MessageRecord {
                    id: channel_id * 10,
                    author_name: "a".to_string(),
                    display_name: "A".to_string(),
                    content: "thread post".to_string(),
                    created_at: now - Duration::hours(1),
                    application_id: None,
                }]
                .into())
            });

        let mut announcer = MockAnnouncer::new();
        announcer.expect_announce().withf(|r| r.body == DIGEST_INTRO).times(1).returning(|_| Ok(()));
        announcer.expect_announce().withf(|r| r.body == "2 messages").times(1).returning(|_| Ok(()));

        let digest = digest_with(history, announcer).await;
        assert!(digest.run(now).await.unwrap());
    }

    #[tokio::test]
    async fn empty_window_posts_nothing() {
        let mut history = MockHistorySource::new();
        history.expect_message_channels().returning(|id| Ok(vec![id]));
        history.expect_fetch_history().returning(|_, _| Ok(HistoryBatch::default()));
        let mut announcer = MockAnnouncer::new();
        announcer.expect_announce().times(0);

        let digest = digest_with(history, announcer).await;
        assert!(!digest.run(Utc::now()).await.unwrap());
    }
}
