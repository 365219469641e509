// File: src/services/digest_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use digestbot_common::models::message::{ChannelRef, Requester};

use crate::platforms::{CommandReply, Reply};
use crate::summarizer::{SummarizerService, SummaryOutcome, SummaryRequest};
use crate::utils::split_text_max_length;
use crate::Error;

pub const DEFAULT_PERIOD: &str = "24h";
pub const SUMMARY_TITLE: &str = "Summary";

pub const NON_CHANNEL_MESSAGE: &str = "Sorry, cannot provide a response for a non-channel medium";
pub const NO_MESSAGES_MESSAGE: &str =
    "Whoops! It looks like there are no new messages for summarisation in this channel.";
pub const FORBIDDEN_MESSAGE: &str =
    "Sorry, I don't have permission to read the history of this channel.";

/// A parsed `/digest` invocation.
#[derive(Debug, Clone)]
pub struct DigestInvocation {
    /// `None` when the command was not issued from a channel.
    pub channel: Option<ChannelRef>,
    pub requester: Requester,
    pub period: String,
    /// Whether replies are visible to the whole channel.
    pub public: bool,
}

/// Turns summarizer results into replies and decides which failures the
/// requester sees and how.
pub struct DigestCommandService {
    summarizer: Arc<SummarizerService>,
    max_reply_length: usize,
}

impl DigestCommandService {
    pub fn new(summarizer: Arc<SummarizerService>, max_reply_length: usize) -> Self {
        Self { summarizer, max_reply_length }
    }

    /// Handles one `/digest` request end to end.
    ///
    /// Informational outcomes (no messages, bad period, no access) and
    /// failures of external collaborators are answered and resolved here.
    /// Anything else is logged, answered, and returned to the caller.
    pub async fn on_summarize_requested(
        &self,
        invocation: DigestInvocation,
        reply: &dyn CommandReply,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let Some(channel) = invocation.channel else {
            return reply.send_reply(Reply::plain(NON_CHANNEL_MESSAGE, true)).await;
        };

        let request = SummaryRequest {
            channel,
            requester: invocation.requester,
            period: invocation.period,
        };

        match self.summarizer.summarize(&request, now).await {
            Ok(outcome) => self.send_summary(&outcome, !invocation.public, reply).await,
            Err(Error::NoMessages(_)) => reply.send_reply(Reply::plain(NO_MESSAGES_MESSAGE, true)).await,
            Err(e @ Error::InvalidPeriod(_)) => reply.send_reply(Reply::plain(e.to_string(), true)).await,
            Err(Error::Forbidden(channel_id)) => {
                warn!("No access to history of channel {}", channel_id);
                reply.send_reply(Reply::plain(FORBIDDEN_MESSAGE, true)).await
            }
            Err(e) if e.is_external() => {
                let correlation_id = Uuid::new_v4();
                error!(
                    "[{}] /digest failed for user {} in channel {} ({}): {}",
                    correlation_id, request.requester.id, request.channel.id, request.period, e
                );
                reply.send_reply(Reply::plain(external_failure_message(correlation_id), true)).await
            }
            Err(e) => {
                let correlation_id = Uuid::new_v4();
                error!(
                    "[{}] Unexpected error handling /digest for user {} in channel {} ({}): {:?}",
                    correlation_id, request.requester.id, request.channel.id, request.period, e
                );
                if let Err(reply_err) = reply
                    .send_reply(Reply::plain(unexpected_failure_message(correlation_id, &e), true))
                    .await
                {
                    error!("[{}] Could not notify requester: {}", correlation_id, reply_err);
                }
                Err(e)
            }
        }
    }

    async fn send_summary(&self, outcome: &SummaryOutcome, ephemeral: bool, reply: &dyn CommandReply) -> Result<(), Error> {
        let chunks = split_text_max_length(&outcome.display_text(), self.max_reply_length);
        info!(
            "Sending {} summary in {} part(s)",
            if outcome.is_cached() { "cached" } else { "generated" },
            chunks.len()
        );

        for (idx, body) in chunks.into_iter().enumerate() {
            reply
                .send_reply(Reply {
                    title: (idx == 0).then(|| SUMMARY_TITLE.to_string()),
                    body,
                    ephemeral,
                })
                .await?;
        }
        Ok(())
    }
}

fn external_failure_message(correlation_id: Uuid) -> String {
    format!(
        "Sorry, something went wrong while generating this summary. \
         Please open a #helpdesk ticket and quote reference `{correlation_id}`."
    )
}

fn unexpected_failure_message(correlation_id: Uuid, error: &Error) -> String {
    format!(
        "An error occurred while trying to run this command. Please open a #helpdesk ticket \
         and describe the situation (reference `{correlation_id}`):\n```\n{error}\n```"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ChannelMessageCache, SummaryResponseCache};
    use crate::config::SummarizerConfig;
    use crate::platforms::{HistoryBatch, MockCommandReply, MockHistorySource};
    use crate::repositories::InMemoryVariableStore;
    use digestbot_ai::{AiClient, Provider};

    fn requester() -> Requester {
        Requester { id: 3, name: "carol".to_string(), display_name: "Carol".to_string() }
    }

    fn invocation(channel: Option<ChannelRef>, period: &str) -> DigestInvocation {
        DigestInvocation { channel, requester: requester(), period: period.to_string(), public: false }
    }

    fn general() -> Option<ChannelRef> {
        Some(ChannelRef { id: 10, name: "general".to_string() })
    }

    fn command_service(history: MockHistorySource) -> DigestCommandService {
        let ai = Arc::new(AiClient::new(Arc::new(Provider::new()), "none"));
        let summarizer = SummarizerService::new(
            Arc::new(ChannelMessageCache::default()),
            Arc::new(SummaryResponseCache::new()),
            Arc::new(history),
            ai,
            Arc::new(InMemoryVariableStore::new()),
            SummarizerConfig::default(),
        );
        DigestCommandService::new(Arc::new(summarizer), 4096)
    }

    #[tokio::test]
    async fn non_channel_invocations_get_an_ephemeral_notice() {
        let mut reply = MockCommandReply::new();
        reply
            .expect_send_reply()
            .withf(|r| r.body == NON_CHANNEL_MESSAGE && r.ephemeral)
            .times(1)
            .returning(|_| Ok(()));

        let service = command_service(MockHistorySource::new());
        service.on_summarize_requested(invocation(None, "24h"), &reply, Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn empty_channel_is_informational() {
        let mut history = MockHistorySource::new();
        history.expect_fetch_history().returning(|_, _| Ok(HistoryBatch::default()));
        let mut reply = MockCommandReply::new();
        reply
            .expect_send_reply()
            .withf(|r| r.body == NO_MESSAGES_MESSAGE)
            .times(1)
            .returning(|_| Ok(()));

        let service = command_service(history);
        let result = service.on_summarize_requested(invocation(general(), "24h"), &reply, Utc::now()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bad_period_is_explained_without_fetching() {
        let mut history = MockHistorySource::new();
        history.expect_fetch_history().times(0);
        let mut reply = MockCommandReply::new();
        reply
            .expect_send_reply()
            .withf(|r| r.body.contains("'24x'") && r.ephemeral)
            .times(1)
            .returning(|_| Ok(()));

        let service = command_service(history);
        service.on_summarize_requested(invocation(general(), "24x"), &reply, Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn forbidden_channel_gets_a_permission_message() {
        let mut history = MockHistorySource::new();
        history.expect_fetch_history().returning(|id, _| Err(Error::Forbidden(id)));
        let mut reply = MockCommandReply::new();
        reply
            .expect_send_reply()
            .withf(|r| r.body == FORBIDDEN_MESSAGE)
            .times(1)
            .returning(|_| Ok(()));

        let service = command_service(history);
        service.on_summarize_requested(invocation(general(), "24h"), &reply, Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn external_failures_carry_a_reference_and_are_not_raised() {
        let mut history = MockHistorySource::new();
        history
            .expect_fetch_history()
            .returning(|_, _| Err(Error::Platform("gateway timeout".to_string())));
        let mut reply = MockCommandReply::new();
        reply
            .expect_send_reply()
            .withf(|r| r.body.contains("reference `") && !r.body.contains("gateway timeout"))
            .times(1)
            .returning(|_| Ok(()));

        let service = command_service(history);
        service.on_summarize_requested(invocation(general(), "24h"), &reply, Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn unexpected_failures_are_reported_then_raised() {
        let mut history = MockHistorySource::new();
        history
            .expect_fetch_history()
            .returning(|_, _| Err(Error::Internal("broken invariant".to_string())));
        let mut reply = MockCommandReply::new();
        reply
            .expect_send_reply()
            .withf(|r| r.body.contains("broken invariant"))
            .times(1)
            .returning(|_| Ok(()));

        let service = command_service(history);
        let result = service.on_summarize_requested(invocation(general(), "24h"), &reply, Utc::now()).await;
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
