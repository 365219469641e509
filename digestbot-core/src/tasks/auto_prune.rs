use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use digestbot_common::models::message::ChannelId;

use crate::config::AutoPruneConfig;
use crate::platforms::{Announcer, HistorySource, MessageJanitor, Reply};
use crate::Error;

/// Per-run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AutoPruneSummary {
    pub deleted: usize,
    pub forbidden: usize,
    pub failed: usize,
}

fn age_phrase(max_age: Duration) -> String {
    max_age
        .to_std()
        .map(|age| humantime::format_duration(age).to_string())
        .unwrap_or_else(|_| format!("{}s", max_age.num_seconds()))
}

/// The moderator notice for one channel that had messages deleted.
pub fn prune_summary_reply(channel_id: ChannelId, deleted: usize, max_age: Duration, threshold: DateTime<Utc>) -> Reply {
    Reply {
        title: Some(format!("Auto Prune summary for channel {channel_id}")),
        body: format!(
            "Pruned {deleted} messages older than {} ( {} UTC ) from channel <#{channel_id}>",
            age_phrase(max_age),
            threshold.format("%Y-%m-%d %H:%M:%S"),
        ),
        ephemeral: false,
    }
}

pub fn permission_reply(channel_id: ChannelId) -> Reply {
    Reply {
        title: Some(format!("Could not delete messages in channel {channel_id}")),
        body: format!(
            "Could not delete messages in <#{channel_id}>.\n\n\
             Make sure the bot has **Manage Messages permission** in this channel."
        ),
        ephemeral: false,
    }
}

/// Deletes messages older than the configured age from Discord itself and
/// tells moderators what was removed.
pub struct AutoPruner {
    history: Arc<dyn HistorySource>,
    janitor: Arc<dyn MessageJanitor>,
    reports: Arc<dyn Announcer>,
    config: AutoPruneConfig,
}

impl AutoPruner {
    pub fn new(
        history: Arc<dyn HistorySource>,
        janitor: Arc<dyn MessageJanitor>,
        reports: Arc<dyn Announcer>,
        config: AutoPruneConfig,
    ) -> Self {
        Self { history, janitor, reports, config }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> AutoPruneSummary {
        let threshold = now - self.config.max_age;
        let mut summary = AutoPruneSummary::default();

        for &channel_id in &self.config.channel_ids {
            match self.prune_channel(channel_id, threshold).await {
                Ok(0) => debug!("Auto-prune: nothing older than {} in channel {}", threshold, channel_id),
                Ok(deleted) => {
                    summary.deleted += deleted;
                    self.report(prune_summary_reply(channel_id, deleted, self.config.max_age, threshold))
                        .await;
                }
                Err(Error::Forbidden(_)) => {
                    error!(
                        "Could not delete messages in channel {} due to lack of permissions. \
                         Ensure the bot has Manage Messages permissions in this channel",
                        channel_id
                    );
                    summary.forbidden += 1;
                    self.report(permission_reply(channel_id)).await;
                }
                Err(e) => {
                    error!("Auto-prune of channel {} failed: {}", channel_id, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn prune_channel(&self, channel_id: ChannelId, threshold: DateTime<Utc>) -> Result<usize, Error> {
        info!("Auto-pruning messages in channel {} older than {}", channel_id, threshold);

        let mut deleted = 0;
        for source in self.history.message_channels(channel_id).await? {
            for message in self.janitor.messages_before(source, threshold).await? {
                if message.created_at >= threshold {
                    continue;
                }
                if self.config.ignored_message_ids.contains(&message.id) {
                    debug!(
                        "Skipping ignored message {} at {} by {}",
                        message.id, message.created_at, message.author_name
                    );
                    continue;
                }
                info!(
                    "Pruning message {} at {} by {}",
                    message.id, message.created_at, message.author_name
                );
                self.janitor.delete_message(source, message.id).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn report(&self, reply: Reply) {
        if let Err(e) = self.reports.announce(reply).await {
            error!("Could not post auto-prune report: {}", e);
        }
    }
}

/// Runs the pruner every `interval`, starting with an immediate pass.
pub fn spawn_auto_prune_task(pruner: Arc<AutoPruner>, interval: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let summary = pruner.run(Utc::now()).await;
            info!(
                "Auto-prune pass done: {} deleted, {} forbidden, {} failed",
                summary.deleted, summary.forbidden, summary.failed
            );
            sleep(interval).await;
        }
    })
}
