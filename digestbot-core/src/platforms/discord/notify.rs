// File: src/platforms/discord/notify.rs

use std::sync::Arc;

use async_trait::async_trait;
use twilight_http::Client as HttpClient;
use twilight_model::channel::message::Embed;
use twilight_model::id::marker::ChannelMarker;
use twilight_model::id::Id;
use twilight_util::builder::embed::EmbedBuilder;

use crate::platforms::{Announcer, NotificationSink, Reply};
use crate::summarizer::UsageReport;
use crate::Error;

/// Discord caps embed descriptions at this many characters.
pub const MAX_EMBED_DESCRIPTION: usize = 4096;

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn channel_mention(channel_id: u64) -> String {
    format!("<#{channel_id}>")
}

/// The usage/cost embed followed by the generated-text embed.
pub fn usage_report_embeds(report: &UsageReport) -> Vec<Embed> {
    let user = &report.requester;
    let channel = channel_mention(report.channel.id);

    let mut description = format!(
        "Generated for channel {channel} by {} ({}) over `{}` with `{}`:\n\
         ### Tokens consumed\n\
         Completion = `{}`\n\
         Prompt = `{}`\n\
         Total = `{}`\n\n\
         Estimated message cost = `US ${:.6}`\n",
        user.display_name,
        user.name,
        report.period,
        report.model,
        report.usage.completion_tokens,
        report.usage.prompt_tokens,
        report.usage.total_tokens,
        report.cost,
    );
    match &report.month {
        Some(month) => description.push_str(&format!(
            "### This month's costs\n\
             All users = `US ${:.6}`\n\
             All channels = `US ${:.6}`\n\
             {channel} channel cost = `US ${:.6}`\n\
             {} user cost = `US ${:.6}`",
            month.all_users, month.all_channels, month.channel, user.display_name, month.user,
        )),
        None => description.push_str("*Spend ledger could not be updated for this request.*"),
    }

    let usage = EmbedBuilder::new()
        .title(format!("GenAI summary for {} ({})", user.display_name, user.name))
        .description(truncate_chars(&description, MAX_EMBED_DESCRIPTION))
        .build();

    let generated = EmbedBuilder::new()
        .title(format!("Generated response for {} ({})", user.display_name, user.name))
        .description(truncate_chars(
            &format!("### Generated Text\n{}", report.text),
            MAX_EMBED_DESCRIPTION,
        ))
        .build();

    vec![usage, generated]
}

pub fn reply_embed(reply: &Reply) -> Embed {
    let mut builder = EmbedBuilder::new().description(truncate_chars(&reply.body, MAX_EMBED_DESCRIPTION));
    if let Some(title) = &reply.title {
        builder = builder.title(title.clone());
    }
    builder.build()
}

/// Posts usage reports into the moderation channel.
pub struct DiscordModerationSink {
    http: Arc<HttpClient>,
    channel_id: Id<ChannelMarker>,
}

impl DiscordModerationSink {
    pub fn new(http: Arc<HttpClient>, channel_id: Id<ChannelMarker>) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl NotificationSink for DiscordModerationSink {
    async fn notify(&self, report: &UsageReport) -> Result<(), Error> {
        let embeds = usage_report_embeds(report);
        self.http
            .create_message(self.channel_id)
            .embeds(&embeds)
            .await
            .map_err(|e| Error::Platform(format!("Error sending moderation report: {e}")))?;
        Ok(())
    }
}

/// Posts into a fixed channel. Used for the daily digest.
pub struct DiscordAnnouncer {
    http: Arc<HttpClient>,
    channel_id: Id<ChannelMarker>,
}

impl DiscordAnnouncer {
    pub fn new(http: Arc<HttpClient>, channel_id: Id<ChannelMarker>) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Announcer for DiscordAnnouncer {
    async fn announce(&self, reply: Reply) -> Result<(), Error> {
        let embeds = [reply_embed(&reply)];
        self.http
            .create_message(self.channel_id)
            .embeds(&embeds)
            .await
            .map_err(|e| Error::Platform(format!("Error sending announcement: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::MonthTotals;
    use digestbot_common::models::message::{ChannelRef, Requester};
    use digestbot_common::models::summary::SummaryUsage;

    fn report(month: Option<MonthTotals>) -> UsageReport {
        UsageReport {
            channel: ChannelRef { id: 55, name: "general".to_string() },
            requester: Requester { id: 9, name: "dave".to_string(), display_name: "Dave".to_string() },
            period: "24h".to_string(),
            model: "gpt-test".to_string(),
            usage: SummaryUsage { prompt_tokens: 900, completion_tokens: 100, total_tokens: 1000 },
            cost: 0.02,
            month,
            text: "They talked about lunch.".to_string(),
        }
    }

    #[test]
    fn report_lists_tokens_and_month_totals() {
        let month = MonthTotals { all_users: 1.5, all_channels: 1.5, channel: 0.25, user: 0.02 };
        let embeds = usage_report_embeds(&report(Some(month)));

        assert_eq!(embeds.len(), 2);
        let usage = embeds[0].description.as_deref().unwrap();
        assert!(usage.contains("Total = `1000`"));
        assert!(usage.contains("Estimated message cost = `US $0.020000`"));
        assert!(usage.contains("<#55> channel cost = `US $0.250000`"));
        assert!(embeds[1].description.as_deref().unwrap().ends_with("They talked about lunch."));
    }

    #[test]
    fn report_without_ledger_says_so() {
        let embeds = usage_report_embeds(&report(None));
        assert!(embeds[0].description.as_deref().unwrap().contains("could not be updated"));
    }

    #[test]
    fn long_bodies_are_truncated_to_the_embed_limit() {
        let reply = Reply::plain("x".repeat(5000), false);
        let embed = reply_embed(&reply);
        assert_eq!(embed.description.unwrap().chars().count(), MAX_EMBED_DESCRIPTION);
    }
}
