// File: src/summarizer/service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use digestbot_ai::{AiClient, CompletionRequest, CompletionResponse};
use digestbot_common::models::ledger::{token_cost, TokenLedger};
use digestbot_common::models::message::{ChannelRef, MessageRecord, Requester};
use digestbot_common::models::summary::SummaryUsage;
use digestbot_common::traits::VariableStore;

use crate::cache::{ChannelMessageCache, SummaryResponseCache};
use crate::config::SummarizerConfig;
use crate::platforms::{HistorySource, NotificationSink};
use crate::summarizer::hydrator::Hydrator;
use crate::summarizer::ledger::LedgerService;
use crate::summarizer::period::parse_period;
use crate::summarizer::prompt::PromptBuilder;
use crate::summarizer::settings::SummarizerSettings;
use crate::Error;

#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub channel: ChannelRef,
    pub requester: Requester,
    /// Raw period specifier as typed by the user, e.g. "24h".
    pub period: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSummary {
    pub text: String,
    pub usage: SummaryUsage,
    pub cost: f64,
    pub model: String,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    Cached {
        text: String,
        expires_at: DateTime<Utc>,
        remaining: std::time::Duration,
    },
    Generated(GeneratedSummary),
}

impl SummaryOutcome {
    pub fn text(&self) -> &str {
        match self {
            SummaryOutcome::Cached { text, .. } => text,
            SummaryOutcome::Generated(summary) => &summary.text,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, SummaryOutcome::Cached { .. })
    }

    /// The text shown to the requester. Cached answers say how long they
    /// will keep being served.
    pub fn display_text(&self) -> String {
        match self {
            SummaryOutcome::Cached { text, remaining, .. } => format!(
                "{}\n\n*(cached for another {})*",
                text,
                humantime::format_duration(*remaining)
            ),
            SummaryOutcome::Generated(summary) => summary.text.clone(),
        }
    }
}

/// Calendar-month spend, all in USD.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonthTotals {
    pub all_users: f64,
    pub all_channels: f64,
    pub channel: f64,
    pub user: f64,
}

impl MonthTotals {
    pub fn from_ledger(ledger: &TokenLedger, channel: &ChannelRef, user: &Requester, month: DateTime<Utc>) -> Self {
        Self {
            all_users: ledger.month_total_all_users(month),
            all_channels: ledger.month_total_all_channels(month),
            channel: ledger.month_total_for_channel(channel.id, month),
            user: ledger.month_total_for_user(user.id, month),
        }
    }
}

/// What moderators are told after each generated summary.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    pub channel: ChannelRef,
    pub requester: Requester,
    pub period: String,
    pub model: String,
    pub usage: SummaryUsage,
    pub cost: f64,
    /// Absent when the ledger could not be updated.
    pub month: Option<MonthTotals>,
    pub text: String,
}

/// Ties the caches, the model and the ledger together.
pub struct SummarizerService {
    messages: Arc<ChannelMessageCache>,
    responses: Arc<SummaryResponseCache>,
    hydrator: Hydrator,
    prompt: PromptBuilder,
    ai: Arc<AiClient>,
    variables: Arc<dyn VariableStore>,
    ledger: LedgerService,
    notifier: Option<Arc<dyn NotificationSink>>,
    config: SummarizerConfig,
}

impl SummarizerService {
    pub fn new(
        messages: Arc<ChannelMessageCache>,
        responses: Arc<SummaryResponseCache>,
        history: Arc<dyn HistorySource>,
        ai: Arc<AiClient>,
        variables: Arc<dyn VariableStore>,
        config: SummarizerConfig,
    ) -> Self {
        Self {
            hydrator: Hydrator::new(messages.clone(), history),
            prompt: PromptBuilder::new(config.timezone),
            ledger: LedgerService::new(variables.clone(), config.variables.spend_history.clone()),
            messages,
            responses,
            ai,
            variables,
            notifier: None,
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn messages(&self) -> Arc<ChannelMessageCache> {
        self.messages.clone()
    }

    pub fn responses(&self) -> Arc<SummaryResponseCache> {
        self.responses.clone()
    }

    pub fn hydrator(&self) -> &Hydrator {
        &self.hydrator
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarises one channel for one requester.
    ///
    /// A bad period fails before any I/O. A live cached answer for the same
    /// `(channel, period)` is returned without touching the model.
    pub async fn summarize(&self, request: &SummaryRequest, now: DateTime<Utc>) -> Result<SummaryOutcome, Error> {
        let channel = &request.channel;
        let since = parse_period(&request.period, now)?;

        if let Some(entry) = self.responses.get(channel.id, &request.period, now) {
            debug!("Serving cached summary for channel {} ({})", channel.id, request.period);
            let remaining = entry.remaining(now).num_seconds().max(0) as u64;
            return Ok(SummaryOutcome::Cached {
                text: entry.text,
                expires_at: entry.expires_at,
                remaining: std::time::Duration::from_secs(remaining),
            });
        }

        self.hydrator.ensure_covered(channel.id, since).await?;

        let mut messages = self.messages.get_all(channel.id);
        if messages.is_empty() {
            // Pruned or deleted while hydration was suspended.
            return Err(Error::NoMessages(channel.id));
        }
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let (response, model) = self.generate(&messages).await?;
        let usage = SummaryUsage {
            prompt_tokens: response.usage.prompt_tokens,
            completion_tokens: response.usage.completion_tokens,
            total_tokens: response.usage.total_tokens,
        };

        let (cost, month) = match self
            .ledger
            .append(channel, &request.requester, usage.total_tokens, self.config.token_cost, now)
            .await
        {
            Ok((ledger, cost)) => (
                cost,
                Some(MonthTotals::from_ledger(&ledger, channel, &request.requester, now)),
            ),
            Err(e) => {
                error!(
                    "Failed to record {} tokens for channel {} in the spend ledger: {}",
                    usage.total_tokens, channel.id, e
                );
                (token_cost(usage.total_tokens, self.config.token_cost), None)
            }
        };

        if response.text.trim().is_empty() {
            return Err(Error::Ai("No response from AI received".to_string()));
        }

        info!(
            "Summarised {} messages in channel {} for user {} ({} tokens, ${:.6})",
            messages.len(),
            channel.id,
            request.requester.id,
            usage.total_tokens,
            cost
        );

        self.report(UsageReport {
            channel: channel.clone(),
            requester: request.requester.clone(),
            period: request.period.clone(),
            model: model.clone(),
            usage,
            cost,
            month,
            text: response.text.clone(),
        })
        .await;

        self.responses
            .put(channel.id, &request.period, &response.text, self.config.response_cache_ttl, now);

        Ok(SummaryOutcome::Generated(GeneratedSummary {
            text: response.text,
            usage,
            cost,
            model,
            message_count: messages.len(),
        }))
    }

    /// One summary across several channels, restricted to messages created
    /// at or after `since`. Forums are read through their active threads.
    /// Channels with nothing to read are skipped.
    /// `Ok(None)` when the whole window is empty.
    pub async fn digest(&self, channels: &[ChannelRef], since: DateTime<Utc>) -> Result<Option<GeneratedSummary>, Error> {
        let mut messages: Vec<MessageRecord> = Vec::new();
        for channel in channels {
            let sources = match self.hydrator.message_channels(channel.id).await {
                Ok(sources) => sources,
                Err(Error::Forbidden(_)) => {
                    warn!("Digest: no access to channel {} ({})", channel.id, channel.name);
                    continue;
                }
                Err(e) => return Err(e),
            };
            for source in sources {
                match self.hydrator.ensure_covered(source, since).await {
                    Ok(_) => {}
                    Err(Error::NoMessages(_)) => {
                        debug!("Digest: channel {} has no messages", source);
                        continue;
                    }
                    Err(Error::Forbidden(_)) => {
                        warn!("Digest: no access to channel {} (in {})", source, channel.name);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
                messages.extend(
                    self.messages
                        .get_all(source)
                        .into_iter()
                        .filter(|m| m.created_at >= since),
                );
            }
        }

        if messages.is_empty() {
            warn!("Digest: no messages since {} in {} channels", since, channels.len());
            return Ok(None);
        }

        let (response, model) = self.generate(&messages).await?;
        if response.text.trim().is_empty() {
            return Err(Error::Ai("No response from AI received".to_string()));
        }

        let usage = SummaryUsage {
            prompt_tokens: response.usage.prompt_tokens,
            completion_tokens: response.usage.completion_tokens,
            total_tokens: response.usage.total_tokens,
        };
        info!("Digest: summarised {} messages ({} tokens)", messages.len(), usage.total_tokens);

        Ok(Some(GeneratedSummary {
            text: response.text,
            usage,
            cost: token_cost(usage.total_tokens, self.config.token_cost),
            model,
            message_count: messages.len(),
        }))
    }

    async fn generate(&self, messages: &[MessageRecord]) -> Result<(CompletionResponse, String), Error> {
        let settings = SummarizerSettings::load(
            self.variables.as_ref(),
            &self.config.variables,
            &self.config.default_model,
        )
        .await;

        let request = CompletionRequest {
            messages: self.prompt.build(messages, &settings.prompt_prefix, &settings.prompt_suffix),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            model: Some(settings.model.clone()),
        };
        let response = self.ai.complete(request).await?;
        Ok((response, settings.model))
    }

    async fn report(&self, report: UsageReport) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(e) = notifier.notify(&report).await {
            error!("Failed to send usage report for channel {}: {}", report.channel.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::{MockHistorySource, MockNotificationSink};
    use crate::repositories::InMemoryVariableStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use digestbot_ai::{ModelProvider, Provider, TokenUsage};

    struct Fixed(&'static str);

    #[async_trait]
    impl ModelProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
            Ok(CompletionResponse {
                text: self.0.to_string(),
                usage: TokenUsage { prompt_tokens: 800, completion_tokens: 200, total_tokens: 1000 },
            })
        }
    }

    async fn ai(text: &'static str) -> Arc<AiClient> {
        let provider = Provider::new();
        provider.register(Fixed(text)).await;
        Arc::new(AiClient::new(Arc::new(provider), "fixed"))
    }

    fn request(period: &str) -> SummaryRequest {
        SummaryRequest {
            channel: ChannelRef { id: 1, name: "general".to_string() },
            requester: Requester { id: 7, name: "bob".to_string(), display_name: "Bob".to_string() },
            period: period.to_string(),
        }
    }

    fn history(now: DateTime<Utc>) -> MockHistorySource {
        let mut history = MockHistorySource::new();
        history.expect_fetch_history().returning(move |_, _| {
            Ok(vec![MessageRecord {
                id: 1,
                author_name: "alice".to_string(),
                display_name: "Alice".to_string(),
                content: "hello".to_string(),
                created_at: now - Duration::hours(1),
                application_id: None,
            }]
            .into())
        });
        history
    }

    fn service(history: MockHistorySource, ai: Arc<AiClient>) -> SummarizerService {
        SummarizerService::new(
            Arc::new(ChannelMessageCache::default()),
            Arc::new(SummaryResponseCache::new()),
            Arc::new(history),
            ai,
            Arc::new(InMemoryVariableStore::new()),
            SummarizerConfig::default(),
        )
    }

    #[tokio::test]
    async fn invalid_period_fails_before_any_io() {
        let mut history = MockHistorySource::new();
        history.expect_fetch_history().times(0);
        let service = service(history, ai("unused").await);

        let result = service.summarize(&request("24x"), Utc::now()).await;
        assert!(matches!(result, Err(Error::InvalidPeriod(_))));
    }

    #[tokio::test]
    async fn usage_report_carries_month_totals() {
        let now = Utc::now();
        let mut sink = MockNotificationSink::new();
        sink.expect_notify()
            .withf(|report| {
                report.usage.total_tokens == 1000
                    && report.cost == 0.02
                    && report.month.is_some_and(|m| m.user == 0.02 && m.channel == 0.02)
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service(history(now), ai("a summary").await).with_notifier(Arc::new(sink));
        let outcome = service.summarize(&request("24h"), now).await.unwrap();
        assert_eq!(outcome.text(), "a summary");
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_the_request() {
        let now = Utc::now();
        let mut sink = MockNotificationSink::new();
        sink.expect_notify()
            .returning(|_| Err(Error::Platform("mod channel gone".to_string())));

        let service = service(history(now), ai("ok").await).with_notifier(Arc::new(sink));
        assert!(service.summarize(&request("24h"), now).await.is_ok());
    }

    #[tokio::test]
    async fn empty_model_output_is_not_cached() {
        let now = Utc::now();
        let service = service(history(now), ai("  ").await);

        let result = service.summarize(&request("24h"), now).await;
        assert!(matches!(result, Err(Error::Ai(_))));
        assert!(service.responses().get(1, "24h", now).is_none());
    }

    #[test]
    fn cached_outcome_mentions_remaining_time() {
        let outcome = SummaryOutcome::Cached {
            text: "summary".to_string(),
            expires_at: Utc::now(),
            remaining: std::time::Duration::from_secs(125),
        };
        assert_eq!(outcome.display_text(), "summary\n\n*(cached for another 2m 5s)*");
    }
}
