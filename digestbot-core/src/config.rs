// src/config.rs

use std::collections::HashSet;

use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;

/// Names under which dynamic settings live in the variable store.
#[derive(Debug, Clone)]
pub struct VariableNames {
    pub prompt_prefix: String,
    pub prompt_suffix: String,
    pub temperature: String,
    pub max_tokens: String,
    pub model: String,
    pub spend_history: String,
}

impl Default for VariableNames {
    fn default() -> Self {
        Self {
            prompt_prefix: "summariser_prompt_prefix".to_string(),
            prompt_suffix: "summariser_prompt_suffix".to_string(),
            temperature: "summariser_temperature".to_string(),
            max_tokens: "summariser_max_tokens".to_string(),
            model: "summariser_model".to_string(),
            spend_history: "summariser_spend_history".to_string(),
        }
    }
}

/// Static settings for the summarizer, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Zone used when rendering message timestamps into the prompt.
    pub timezone: Tz,
    /// Records older than this are pruned; startup hydration reaches this far back.
    pub message_age_threshold: Duration,
    /// How long a generated summary is served from the response cache.
    pub response_cache_ttl: Duration,
    /// USD per token, applied to the total token count.
    pub token_cost: f64,
    /// Model used when the variable store has no override.
    pub default_model: String,
    pub ignore_application_messages: bool,
    /// Longest single reply chunk (Discord embed description limit).
    pub max_reply_length: usize,
    pub variables: VariableNames,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            message_age_threshold: Duration::days(7),
            response_cache_ttl: Duration::hours(1),
            token_cost: 0.00002,
            default_model: "gpt-4o-mini".to_string(),
            ignore_application_messages: true,
            max_reply_length: 4096,
            variables: VariableNames::default(),
        }
    }
}

/// Discord connection and channel wiring.
#[derive(Debug, Clone, Default)]
pub struct DiscordConfig {
    pub token: String,
    pub guild_id: Option<u64>,
    /// Categories whose text and forum channels are hydrated on startup.
    pub category_ids: Vec<u64>,
    pub mod_channel_id: Option<u64>,
    /// Where the daily digest is posted.
    pub announce_channel_id: Option<u64>,
    /// Channels summarised by the daily digest.
    pub digest_channel_ids: Vec<u64>,
    /// Local time (in `SummarizerConfig::timezone`) to post the daily digest.
    pub daily_digest_at: Option<NaiveTime>,
    /// Upper bound on 100-message pages fetched per channel per hydration.
    pub max_history_pages: usize,
}

/// Which channels the auto-pruner empties of old messages.
#[derive(Debug, Clone)]
pub struct AutoPruneConfig {
    /// Text channels, threads or forums (all active threads) to prune.
    pub channel_ids: Vec<u64>,
    /// Messages older than this are deleted from Discord.
    pub max_age: Duration,
    /// Message ids that are never deleted (pinned rules, welcome posts).
    pub ignored_message_ids: HashSet<u64>,
    pub interval: std::time::Duration,
}

impl Default for AutoPruneConfig {
    fn default() -> Self {
        Self {
            channel_ids: Vec::new(),
            max_age: Duration::days(7),
            ignored_message_ids: HashSet::new(),
            interval: std::time::Duration::from_secs(3_600),
        }
    }
}
