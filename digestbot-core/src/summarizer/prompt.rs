use chrono_tz::Tz;

use digestbot_ai::ChatMessage;
use digestbot_common::models::message::MessageRecord;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders cached messages into a chat-completion payload.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    timezone: Tz,
}

impl PromptBuilder {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// `prefix` as a system entry, every message oldest first as a user
    /// entry, then `suffix` as a system entry. `messages` may be in any order.
    pub fn build(&self, messages: &[MessageRecord], prefix: &str, suffix: &str) -> Vec<ChatMessage> {
        let mut ordered: Vec<&MessageRecord> = messages.iter().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut payload = Vec::with_capacity(ordered.len() + 2);
        payload.push(ChatMessage::system(prefix));
        payload.extend(ordered.into_iter().map(|m| ChatMessage::user(self.format_line(m))));
        payload.push(ChatMessage::system(suffix));
        payload
    }

    pub fn format_line(&self, message: &MessageRecord) -> String {
        let local = message.created_at.with_timezone(&self.timezone);
        format!(
            "{} {}: {}",
            local.format(TIMESTAMP_FORMAT),
            message.display_name,
            message.content
        )
    }
}
