use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use twilight_http::Client as HttpClient;
use twilight_model::channel::{Channel, ChannelType};
use twilight_model::id::Id;

use digestbot_common::models::message::ChannelId;

use crate::summarizer::{Hydrator, SummarizerService};
use crate::Error;

/// Per-run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HydrationSummary {
    pub channels: usize,
    pub inserted: usize,
    pub forbidden: usize,
    pub failed: usize,
}

impl HydrationSummary {
    fn record_failure(&mut self, channel_id: ChannelId, err: &Error) {
        match err {
            Error::Forbidden(_) => {
                warn!("Access to channel {} is forbidden, skipping", channel_id);
                self.forbidden += 1;
            }
            e => {
                error!("Could not hydrate channel {}: {}", channel_id, e);
                self.failed += 1;
            }
        }
    }
}

/// Text and forum channels whose parent is one of `category_ids`.
pub fn hydration_targets(channels: &[Channel], category_ids: &[u64]) -> Vec<ChannelId> {
    let categories: HashSet<u64> = category_ids.iter().copied().collect();
    channels
        .iter()
        .filter(|c| matches!(c.kind, ChannelType::GuildText | ChannelType::GuildForum))
        .filter(|c| c.parent_id.is_some_and(|p| categories.contains(&p.get())))
        .map(|c| c.id.get())
        .collect()
}

/// Backfills each channel in turn, forums through their active threads.
/// One channel failing does not stop the rest.
pub async fn hydrate_channels(hydrator: &Hydrator, channel_ids: &[ChannelId], since: DateTime<Utc>) -> HydrationSummary {
    let mut summary = HydrationSummary::default();
    for &channel_id in channel_ids {
        let sources = match hydrator.message_channels(channel_id).await {
            Ok(sources) => sources,
            Err(e) => {
                summary.record_failure(channel_id, &e);
                continue;
            }
        };
        for source in sources {
            match hydrator.hydrate(source, since).await {
                Ok((_, inserted)) => {
                    summary.channels += 1;
                    summary.inserted += inserted;
                }
                Err(e) => summary.record_failure(source, &e),
            }
        }
    }
    summary
}

/// Fills the message cache for the configured categories once the gateway
/// is ready.
pub struct StartupHydration {
    http: Arc<HttpClient>,
    summarizer: Arc<SummarizerService>,
    guild_id: Option<u64>,
    category_ids: Vec<u64>,
    started: AtomicBool,
}

impl StartupHydration {
    pub fn new(
        http: Arc<HttpClient>,
        summarizer: Arc<SummarizerService>,
        guild_id: Option<u64>,
        category_ids: Vec<u64>,
    ) -> Self {
        Self {
            http,
            summarizer,
            guild_id,
            category_ids,
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the hydration run the first time it is called; later calls
    /// (other shards, reconnects) do nothing.
    pub fn spawn_once(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }
        let this = self.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = this.run(Utc::now()).await {
                error!("Startup hydration failed: {}", e);
            }
        }))
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<HydrationSummary, Error> {
        let Some(guild_id) = self.guild_id.and_then(Id::new_checked) else {
            info!("No guild configured, skipping startup hydration");
            return Ok(HydrationSummary::default());
        };
        if self.category_ids.is_empty() {
            info!("No categories configured, skipping startup hydration");
            return Ok(HydrationSummary::default());
        }

        let channels = self
            .http
            .guild_channels(guild_id)
            .await
            .map_err(|e| Error::Platform(format!("Failed to list guild channels: {e}")))?
            .models()
            .await
            .map_err(|e| Error::Platform(format!("Bad guild channels payload: {e}")))?;

        let targets = hydration_targets(&channels, &self.category_ids);
        let since = now - self.summarizer.config().message_age_threshold;
        info!("Hydrating {} channels since {}", targets.len(), since);

        let summary = hydrate_channels(self.summarizer.hydrator(), &targets, since).await;
        info!(
            "Startup hydration done: {} channels, {} messages, {} forbidden, {} failed",
            summary.channels, summary.inserted, summary.forbidden, summary.failed
        );
        Ok(summary)
    }
}
