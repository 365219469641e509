use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{
    self as gateway,
    CloseFrame,
    Config,
    Event,
    EventTypeFlags,
    Intents,
    MessageSender,
    Shard,
    StreamExt,
};
use twilight_http::client::ClientBuilder;
use twilight_http::Client as HttpClient;
use twilight_model::gateway::payload::incoming::Ready as ReadyPayload;

use digestbot_common::models::message::MessageId;

use crate::platforms::discord::record_from_message;
use crate::services::discord::slashcommands::{handle_interaction_create, register_global_slash_commands};
use crate::services::{DigestCommandService, MessageService};
use crate::tasks::startup_hydration::StartupHydration;
use crate::Error;

/// Everything the shard loop hands events to.
#[derive(Clone)]
pub struct EventHandlers {
    pub messages: Arc<MessageService>,
    pub digest: Arc<DigestCommandService>,
    /// Runs once, on the first Ready.
    pub startup: Option<Arc<StartupHydration>>,
}

/// Applies message create/update/delete events to the summariser cache.
/// Returns false for any other event.
pub(crate) fn apply_message_event(messages: &MessageService, event: &Event) -> bool {
    match event {
        Event::MessageCreate(msg) => {
            messages.on_message_created(msg.channel_id.get(), record_from_message(&msg.0));
        }
        Event::MessageUpdate(update) => {
            messages.on_message_edited(update.channel_id.get(), update.id.get(), &update.content);
        }
        Event::MessageDelete(deleted) => {
            messages.on_message_deleted(deleted.channel_id.get(), deleted.id.get());
        }
        Event::MessageDeleteBulk(bulk) => {
            let ids: Vec<MessageId> = bulk.ids.iter().map(|id| id.get()).collect();
            debug!("Bulk delete of {} messages in channel {}", ids.len(), bulk.channel_id);
            messages.on_messages_bulk_deleted(bulk.channel_id.get(), &ids);
        }
        _ => return false,
    }
    true
}

/// Drains one shard:
///   - keeps the in-memory cache current
///   - applies message create/update/delete to the summariser cache
///   - routes slash commands
async fn shard_runner(
    mut shard: Shard,
    http: Arc<HttpClient>,
    cache: Arc<InMemoryCache>,
    handlers: EventHandlers,
) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
                continue;
            }
        };
        cache.update(&event);

        match &event {
            Event::Ready(ready) => {
                let data: &ReadyPayload = ready.as_ref();
                info!(
                    "Shard {shard_id} => READY as {} (ID={}) in {} guilds",
                    data.user.name,
                    data.user.id,
                    data.guilds.len()
                );
                if let Err(e) = register_global_slash_commands(&http, data.application.id).await {
                    error!("Shard {shard_id} => {e}");
                }
                if let Some(startup) = &handlers.startup {
                    startup.spawn_once();
                }
            }
            Event::InteractionCreate(interaction) => {
                if let Err(e) = handle_interaction_create(
                    http.clone(),
                    interaction.application_id,
                    handlers.digest.clone(),
                    interaction,
                )
                .await
                {
                    error!("Shard {shard_id} => interaction failed: {e}");
                }
            }
            other => {
                if !apply_message_event(&handlers.messages, other) {
                    trace!("Shard {shard_id} => unhandled event: {:?}", other.kind());
                }
            }
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

pub struct DiscordPlatform {
    token: String,
    http: Arc<HttpClient>,
    cache: Arc<InMemoryCache>,
    shard_tasks: Vec<JoinHandle<()>>,
    shard_senders: Vec<MessageSender>,
}

impl DiscordPlatform {
    pub fn new(token: String) -> Self {
        let http = Arc::new(
            ClientBuilder::new()
                .token(token.clone())
                .timeout(Duration::from_secs(30))
                .build(),
        );
        let cache = Arc::new(
            InMemoryCache::builder()
                .resource_types(ResourceType::GUILD | ResourceType::CHANNEL)
                .build(),
        );
        Self {
            token,
            http,
            cache,
            shard_tasks: Vec::new(),
            shard_senders: Vec::new(),
        }
    }

    pub fn http(&self) -> Arc<HttpClient> {
        self.http.clone()
    }

    pub fn is_connected(&self) -> bool {
        !self.shard_tasks.is_empty()
    }

    /// Starts the recommended number of shards, each on its own task.
    pub async fn connect(&mut self, handlers: EventHandlers) -> Result<(), Error> {
        if self.is_connected() {
            info!("(DiscordPlatform) Already connected => skipping");
            return Ok(());
        }
        if self.token.is_empty() {
            return Err(Error::Platform("Discord token is empty".into()));
        }

        let config = Config::new(
            self.token.clone(),
            Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT,
        );

        let shards = gateway::create_recommended(&self.http, config, |_, b| b.build())
            .await
            .map_err(|e| Error::Platform(format!("create_recommended error: {e}")))?;

        for shard in shards {
            self.shard_senders.push(shard.sender());

            let http_for_shard = self.http.clone();
            let cache_for_shard = self.cache.clone();
            let handlers_for_shard = handlers.clone();

            let handle = tokio::spawn(async move {
                shard_runner(shard, http_for_shard, cache_for_shard, handlers_for_shard).await;
            });
            self.shard_tasks.push(handle);
        }

        info!("(DiscordPlatform) Started {} shard(s)", self.shard_tasks.len());
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<(), Error> {
        // Gracefully close shards
        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        // Wait for them
        for task in &mut self.shard_tasks {
            let _ = task.await;
        }

        self.shard_senders.clear();
        self.shard_tasks.clear();
        Ok(())
    }
}
