// File: digestbot-core/tests/test_utils/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use digestbot_ai::{AiClient, CompletionRequest, CompletionResponse, ModelProvider, Provider, TokenUsage};
use digestbot_common::models::message::{ChannelId, ChannelRef, MessageRecord, Requester};
use digestbot_common::traits::VariableStore;
use digestbot_core::cache::{ChannelMessageCache, SummaryResponseCache};
use digestbot_core::config::SummarizerConfig;
use digestbot_core::platforms::{HistoryBatch, HistorySource};
use digestbot_core::repositories::InMemoryVariableStore;
use digestbot_core::summarizer::SummarizerService;
use digestbot_core::Error;

pub fn message(id: u64, created_at: DateTime<Utc>, content: &str) -> MessageRecord {
    MessageRecord {
        id,
        author_name: format!("user{id}"),
        display_name: format!("User {id}"),
        content: content.to_string(),
        created_at,
        application_id: None,
    }
}

pub fn channel(id: ChannelId) -> ChannelRef {
    ChannelRef { id, name: format!("channel-{id}") }
}

pub fn requester() -> Requester {
    Requester { id: 42, name: "erin".to_string(), display_name: "Erin".to_string() }
}

/// Serves a fixed history and counts how often it was asked. Forums map to
/// their threads; every other channel holds the same messages.
#[derive(Default)]
pub struct FakeHistory {
    pub messages: Mutex<Vec<MessageRecord>>,
    pub forums: HashMap<ChannelId, Vec<ChannelId>>,
    pub calls: AtomicUsize,
}

impl FakeHistory {
    pub fn with_messages(messages: Vec<MessageRecord>) -> Self {
        Self { messages: Mutex::new(messages), ..Self::default() }
    }

    pub fn with_forum(mut self, forum: ChannelId, threads: Vec<ChannelId>) -> Self {
        self.forums.insert(forum, threads);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistorySource for FakeHistory {
    async fn message_channels(&self, channel_id: ChannelId) -> Result<Vec<ChannelId>, Error> {
        Ok(self.forums.get(&channel_id).cloned().unwrap_or_else(|| vec![channel_id]))
    }

    async fn fetch_history(&self, channel_id: ChannelId, after: DateTime<Utc>) -> Result<HistoryBatch, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.forums.contains_key(&channel_id) {
            return Ok(HistoryBatch::default());
        }
        let messages = self.messages.lock().unwrap();
        Ok(messages.iter().filter(|m| m.created_at >= after).cloned().collect::<Vec<_>>().into())
    }
}

/// History whose read is overtaken by a live delete of `deleted` before the
/// page comes back.
pub struct DeletedDuringFetch {
    pub cache: Arc<ChannelMessageCache>,
    pub messages: Vec<MessageRecord>,
    pub deleted: u64,
}

#[async_trait]
impl HistorySource for DeletedDuringFetch {
    async fn message_channels(&self, channel_id: ChannelId) -> Result<Vec<ChannelId>, Error> {
        Ok(vec![channel_id])
    }

    async fn fetch_history(&self, channel_id: ChannelId, _after: DateTime<Utc>) -> Result<HistoryBatch, Error> {
        self.cache.remove(channel_id, self.deleted);
        Ok(self.messages.clone().into())
    }
}

/// Answers every completion with the same text and remembers the requests.
pub struct RecordingModel {
    pub reply: String,
    pub total_tokens: u64,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl RecordingModel {
    pub fn new(reply: &str, total_tokens: u64) -> Self {
        Self { reply: reply.to_string(), total_tokens, requests: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ModelProvider for RecordingModel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(CompletionResponse {
            text: self.reply.clone(),
            usage: TokenUsage {
                prompt_tokens: self.total_tokens - self.total_tokens / 4,
                completion_tokens: self.total_tokens / 4,
                total_tokens: self.total_tokens,
            },
        })
    }
}

/// Reads succeed, writes always fail.
#[derive(Default)]
pub struct ReadOnlyVariables {
    inner: InMemoryVariableStore,
}

#[async_trait]
impl VariableStore for ReadOnlyVariables {
    async fn get_variable(&self, name: &str) -> Result<Option<String>, Error> {
        self.inner.get_variable(name).await
    }

    async fn set_variable(&self, name: &str, _value: &str) -> Result<(), Error> {
        Err(Error::VariableStore(format!("{name} is read-only")))
    }
}

pub struct Harness {
    pub summarizer: SummarizerService,
    pub history: Arc<FakeHistory>,
    pub model: Arc<RecordingModel>,
    pub variables: Arc<dyn VariableStore>,
}

pub async fn harness(history: FakeHistory, model: RecordingModel) -> Harness {
    harness_with_variables(history, model, Arc::new(InMemoryVariableStore::new())).await
}

pub async fn harness_with_variables(
    history: FakeHistory,
    model: RecordingModel,
    variables: Arc<dyn VariableStore>,
) -> Harness {
    let history = Arc::new(history);
    let model = Arc::new(model);

    let provider = Provider::new();
    provider.register_shared(model.clone()).await;
    let ai = Arc::new(AiClient::new(Arc::new(provider), "recording"));

    let summarizer = SummarizerService::new(
        Arc::new(ChannelMessageCache::default()),
        Arc::new(SummaryResponseCache::new()),
        history.clone(),
        ai,
        variables.clone(),
        SummarizerConfig::default(),
    );

    Harness { summarizer, history, model, variables }
}
