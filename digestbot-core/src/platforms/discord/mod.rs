pub mod history;
pub mod janitor;
pub mod notify;
pub mod runtime;

use chrono::{DateTime, Utc};
use twilight_model::channel::Message;
use twilight_model::guild::PartialMember;
use twilight_model::user::User;
use twilight_model::util::Timestamp;

use digestbot_common::models::message::MessageRecord;

pub use history::DiscordHistorySource;
pub use janitor::DiscordJanitor;
pub use notify::{DiscordAnnouncer, DiscordModerationSink};
pub use runtime::DiscordPlatform;

/// Milliseconds between the Unix epoch and the Discord epoch (2015-01-01).
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Smallest snowflake that could have been minted at `at`.
pub fn snowflake_at(at: DateTime<Utc>) -> u64 {
    let since_epoch = (at.timestamp_millis() - DISCORD_EPOCH_MS).max(0) as u64;
    since_epoch << 22
}

pub fn timestamp_to_utc(timestamp: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(timestamp.as_micros()).unwrap_or_else(Utc::now)
}

/// Server nickname, then global display name, then username.
pub fn display_name(author: &User, member: Option<&PartialMember>) -> String {
    member
        .and_then(|m| m.nick.clone())
        .or_else(|| author.global_name.clone())
        .unwrap_or_else(|| author.name.clone())
}

pub fn record_from_message(message: &Message) -> MessageRecord {
    let author = &message.author;
    MessageRecord {
        id: message.id.get(),
        author_name: author.name.clone(),
        display_name: display_name(author, message.member.as_ref()),
        content: message.content.clone(),
        created_at: timestamp_to_utc(message.timestamp),
        application_id: message
            .application_id
            .map(|id| id.get())
            .or_else(|| author.bot.then(|| author.id.get())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snowflake_matches_discord_epoch_layout() {
        let at = Utc.timestamp_millis_opt(DISCORD_EPOCH_MS + 1000).unwrap();
        assert_eq!(snowflake_at(at), 1000 << 22);
        assert_eq!(snowflake_at(Utc.timestamp_millis_opt(0).unwrap()), 0);
    }
}
