use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, TimeDelta};
use chrono_tz::Tz;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use twilight_model::id::Id;

use digestbot_ai::{AiClient, Provider, ProviderConfig};
use digestbot_common::models::message::ChannelRef;
use digestbot_common::traits::VariableStore;
use digestbot_core::cache::{CacheConfig, ChannelMessageCache, SenderFilter, SummaryResponseCache};
use digestbot_core::config::{AutoPruneConfig, DiscordConfig, SummarizerConfig, VariableNames};
use digestbot_core::platforms::discord::runtime::EventHandlers;
use digestbot_core::platforms::discord::{
    DiscordAnnouncer, DiscordHistorySource, DiscordJanitor, DiscordModerationSink, DiscordPlatform,
};
use digestbot_core::repositories::{HttpVariableStore, InMemoryVariableStore};
use digestbot_core::services::{DigestCommandService, MessageService};
use digestbot_core::summarizer::SummarizerService;
use digestbot_core::tasks::{
    spawn_auto_prune_task, spawn_cache_prune_task, spawn_daily_digest_task, AutoPruner, DailyDigest,
    StartupHydration,
};
use digestbot_core::Error;

#[derive(Parser, Debug, Clone)]
#[command(name = "digestbot")]
#[command(author, version, about = "DigestBot - Discord channel summaries on demand")]
struct Args {
    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: String,

    /// Guild whose categories are hydrated on startup
    #[arg(long, env = "DISCORD_BOT_GUILD_ID")]
    guild_id: Option<u64>,

    /// Categories whose channels are hydrated on startup (comma separated)
    #[arg(long, env = "DISCORD_BOT_CATEGORY_IDS", value_delimiter = ',')]
    category_ids: Vec<u64>,

    /// Channel that receives usage and cost reports
    #[arg(long, env = "SUMMARISER_MOD_CHANNEL")]
    mod_channel: Option<u64>,

    /// Channel the daily digest is posted to
    #[arg(long, env = "DISCORD_POST_MESSAGE_CHANNEL")]
    announce_channel: Option<u64>,

    /// Channels summarised by the daily digest (comma separated)
    #[arg(long, env = "SUMMARY_CHANNEL_IDS", value_delimiter = ',')]
    digest_channel_ids: Vec<u64>,

    /// Local time (HH:MM) to post the daily digest; disabled when unset
    #[arg(long, env = "SUMMARY_POST_AT_LOCALTIME")]
    post_at: Option<String>,

    /// IANA timezone used for prompts and the daily digest
    #[arg(long, env = "TIMEZONE", default_value = "UTC")]
    timezone: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    #[arg(long, env = "OPENAI_API_BASE")]
    openai_api_base: Option<String>,

    #[arg(long, env = "OPENAI_ORGANIZATION")]
    openai_organization: Option<String>,

    #[arg(long, env = "OPENAI_PROJECT")]
    openai_project: Option<String>,

    /// Model used when the variable store has no override
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    openai_model: String,

    /// USD per token
    #[arg(long, env = "OPENAI_TOKEN_COST", default_value_t = 0.00002)]
    token_cost: f64,

    /// Cached messages older than this many seconds are pruned
    #[arg(long, env = "SUMMARISER_MESSAGE_AGE_THRESHOLD", default_value_t = 604_800)]
    message_age_threshold: i64,

    /// Seconds a generated summary is served from cache
    #[arg(long, env = "SUMMARISER_RESPONSE_CACHE_EXPIRY", default_value_t = 3_600)]
    response_cache_expiry: i64,

    /// Seconds between cache maintenance passes
    #[arg(long, env = "SUMMARISER_PRUNE_INTERVAL", default_value_t = 600)]
    prune_interval: u64,

    /// Record messages from bots and integrations too
    #[arg(long, env = "SUMMARISER_INCLUDE_BOTS", default_value = "false")]
    include_bots: bool,

    /// Longest single reply chunk
    #[arg(long, env = "DISCORD_MAX_EMBED_LENGTH", default_value_t = 4096)]
    max_embed_length: usize,

    /// Upper bound on 100-message history pages per channel
    #[arg(long, env = "SUMMARISER_MAX_HISTORY_PAGES", default_value_t = 50)]
    max_history_pages: usize,

    /// Base URL of the variable portal; variables stay in memory when unset
    #[arg(long, env = "DADLAN_WAN_API_URL")]
    variables_url: Option<String>,

    #[arg(long, env = "DADLAN_WAN_API_KEY", hide_env_values = true, default_value = "")]
    variables_key: String,

    #[arg(long, env = "SUMMARISER_VAR_PROMPT_PREFIX", default_value = "summariser_prompt_prefix")]
    var_prompt_prefix: String,

    #[arg(long, env = "SUMMARISER_VAR_PROMPT_SUFFIX", default_value = "summariser_prompt_suffix")]
    var_prompt_suffix: String,

    #[arg(long, env = "SUMMARISER_VAR_TEMPERATURE", default_value = "summariser_temperature")]
    var_temperature: String,

    #[arg(long, env = "SUMMARISER_VAR_MAX_TOKENS", default_value = "summariser_max_tokens")]
    var_max_tokens: String,

    #[arg(long, env = "SUMMARISER_VAR_MODEL", default_value = "summariser_model")]
    var_model: String,

    #[arg(long, env = "SUMMARISER_VAR_SPEND_HISTORY", default_value = "summariser_spend_history")]
    var_spend_history: String,

    /// Channels whose old messages are deleted from Discord (comma separated)
    #[arg(long, env = "PRUNER_AUTOPRUNE_CHANNELS", value_delimiter = ',')]
    prune_channel_ids: Vec<u64>,

    /// Messages older than this many seconds are deleted by the auto-pruner
    #[arg(long, env = "PRUNER_MESSAGE_AGE_THRESHOLD", default_value_t = 604_800)]
    prune_age_threshold: i64,

    /// Message ids the auto-pruner never deletes (comma separated)
    #[arg(long, env = "PRUNER_IGNORE_MESSAGES", value_delimiter = ',')]
    prune_ignored_ids: Vec<u64>,

    /// Channel that receives auto-prune reports
    #[arg(long, env = "PRUNER_MOD_CHANNEL")]
    prune_mod_channel: Option<u64>,

    /// Seconds between auto-prune passes
    #[arg(long, env = "PRUNER_INTERVAL", default_value_t = 3_600)]
    prune_run_interval: u64,
}

impl Args {
    fn summarizer_config(&self) -> Result<SummarizerConfig, Error> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|e| Error::Parse(format!("Invalid timezone '{}': {e}", self.timezone)))?;

        Ok(SummarizerConfig {
            timezone,
            message_age_threshold: seconds("SUMMARISER_MESSAGE_AGE_THRESHOLD", self.message_age_threshold)?,
            response_cache_ttl: seconds("SUMMARISER_RESPONSE_CACHE_EXPIRY", self.response_cache_expiry)?,
            token_cost: self.token_cost,
            default_model: self.openai_model.clone(),
            ignore_application_messages: !self.include_bots,
            max_reply_length: self.max_embed_length,
            variables: VariableNames {
                prompt_prefix: self.var_prompt_prefix.clone(),
                prompt_suffix: self.var_prompt_suffix.clone(),
                temperature: self.var_temperature.clone(),
                max_tokens: self.var_max_tokens.clone(),
                model: self.var_model.clone(),
                spend_history: self.var_spend_history.clone(),
            },
        })
    }

    fn discord_config(&self) -> Result<DiscordConfig, Error> {
        let daily_digest_at = self
            .post_at
            .as_deref()
            .map(|s| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
            .transpose()?;

        Ok(DiscordConfig {
            token: self.discord_token.clone(),
            guild_id: self.guild_id,
            category_ids: self.category_ids.clone(),
            mod_channel_id: self.mod_channel,
            announce_channel_id: self.announce_channel,
            digest_channel_ids: self.digest_channel_ids.clone(),
            daily_digest_at,
            max_history_pages: self.max_history_pages,
        })
    }

    /// `None` when no channels are configured for auto-pruning.
    fn auto_prune_config(&self) -> Result<Option<(AutoPruneConfig, u64)>, Error> {
        if self.prune_channel_ids.is_empty() {
            return Ok(None);
        }
        let mod_channel = self.prune_mod_channel.ok_or_else(|| {
            Error::Parse("PRUNER_MOD_CHANNEL is required when PRUNER_AUTOPRUNE_CHANNELS is set".to_string())
        })?;
        let config = AutoPruneConfig {
            channel_ids: self.prune_channel_ids.clone(),
            max_age: seconds("PRUNER_MESSAGE_AGE_THRESHOLD", self.prune_age_threshold)?,
            ignored_message_ids: self.prune_ignored_ids.iter().copied().collect(),
            interval: Duration::from_secs(self.prune_run_interval),
        };
        Ok(Some((config, mod_channel)))
    }

    fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            api_base: self.openai_api_base.clone(),
            api_key: self.openai_api_key.clone(),
            default_model: self.openai_model.clone(),
            organization: self.openai_organization.clone(),
            project: self.openai_project.clone(),
        }
    }
}

/// Non-negative whole seconds that fit a `TimeDelta`.
fn seconds(name: &str, value: i64) -> Result<TimeDelta, Error> {
    if value < 0 {
        return Err(Error::Parse(format!("{name} must not be negative, got {value}")));
    }
    TimeDelta::try_seconds(value).ok_or_else(|| Error::Parse(format!("{name} is out of range: {value}")))
}

fn init_tracing() {
    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::from_default_env()
        .add_directive("digestbot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {e}");
    }
}


#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("DigestBot starting. timezone={}", args.timezone);

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(Box::new(e) as Box<dyn std::error::Error>);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run_server(args: Args) -> Result<(), Error> {
    let summarizer_config = args.summarizer_config()?;
    let discord_config = args.discord_config()?;
    let auto_prune = args.auto_prune_config()?;

    // 1) Stores and caches
    let variables: Arc<dyn VariableStore> = match &args.variables_url {
        Some(url) => {
            info!("Using variable portal at {}", url);
            Arc::new(HttpVariableStore::new(url.clone(), args.variables_key.clone()))
        }
        None => {
            warn!("No variable portal configured; settings and spend ledger are kept in memory only");
            Arc::new(InMemoryVariableStore::new())
        }
    };

    let messages = Arc::new(ChannelMessageCache::new(CacheConfig {
        sender_filter: if summarizer_config.ignore_application_messages {
            SenderFilter::IgnoreApplications
        } else {
            SenderFilter::KeepAll
        },
    }));
    let responses = Arc::new(SummaryResponseCache::new());

    // 2) Model client
    let provider = Provider::new();
    provider.register(Provider::create_openai(args.provider_config())).await;
    let ai = Arc::new(AiClient::new(Arc::new(provider), "openai"));

    // 3) Discord collaborators
    let mut platform = DiscordPlatform::new(discord_config.token.clone());
    let http = platform.http();
    let history = Arc::new(DiscordHistorySource::new(http.clone(), discord_config.max_history_pages));

    let mut summarizer = SummarizerService::new(
        messages.clone(),
        responses.clone(),
        history.clone(),
        ai,
        variables,
        summarizer_config.clone(),
    );
    if let Some(mod_channel) = discord_config.mod_channel_id.and_then(Id::new_checked) {
        summarizer = summarizer.with_notifier(Arc::new(DiscordModerationSink::new(http.clone(), mod_channel)));
    }
    let summarizer = Arc::new(summarizer);

    // 4) Background tasks
    let _maintenance_handle = spawn_cache_prune_task(
        messages.clone(),
        responses,
        summarizer_config.message_age_threshold,
        Duration::from_secs(args.prune_interval),
    );

    let _digest_handle = match (
        discord_config.daily_digest_at,
        discord_config.announce_channel_id.and_then(Id::new_checked),
    ) {
        (Some(at), Some(announce_channel)) => {
            let channels = discord_config
                .digest_channel_ids
                .iter()
                .map(|id| ChannelRef { id: *id, name: id.to_string() })
                .collect();
            let digest = Arc::new(DailyDigest::new(
                summarizer.clone(),
                Arc::new(DiscordAnnouncer::new(http.clone(), announce_channel)),
                channels,
                summarizer_config.max_reply_length,
            ));
            Some(spawn_daily_digest_task(digest, at, summarizer_config.timezone))
        }
        (Some(_), None) => {
            warn!("Daily digest time set but no announce channel configured; digest disabled");
            None
        }
        _ => None,
    };

    let _auto_prune_handle = match auto_prune {
        Some((config, mod_channel)) => match Id::new_checked(mod_channel) {
            Some(mod_channel) => {
                info!("Auto-prune enabled for {} channel(s)", config.channel_ids.len());
                let interval = config.interval;
                let pruner = Arc::new(AutoPruner::new(
                    history,
                    Arc::new(DiscordJanitor::new(http.clone(), discord_config.max_history_pages)),
                    Arc::new(DiscordAnnouncer::new(http.clone(), mod_channel)),
                    config,
                ));
                Some(spawn_auto_prune_task(pruner, interval))
            }
            None => {
                warn!("PRUNER_MOD_CHANNEL is not a valid channel id; auto-prune disabled");
                None
            }
        },
        None => None,
    };

    // 5) Gateway
    let handlers = EventHandlers {
        messages: Arc::new(MessageService::new(messages)),
        digest: Arc::new(DigestCommandService::new(summarizer.clone(), summarizer_config.max_reply_length)),
        startup: Some(Arc::new(StartupHydration::new(
            http,
            summarizer,
            discord_config.guild_id,
            discord_config.category_ids.clone(),
        ))),
    };
    platform.connect(handlers).await?;

    // 6) Wait for Ctrl-C
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {:?}", e);
    }
    info!("Ctrl-C detected; shutting down shards...");
    platform.disconnect().await?;

    Ok(())
}
