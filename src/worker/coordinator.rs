//! The orchestration core: one summarization request end to end.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dispatch::dispatch_all;
use crate::capabilities::{Capabilities, TextCompletion};
use crate::classifier::ContentClassifier;
use crate::composer::Composer;
use crate::core::chat_state::ChatStore;
use crate::core::config::AppConfig;
use crate::core::models::{
    ChatId, ContentSignal, Message, SignalKind, SummaryRequest, SummaryResult, Tone,
};
use crate::core::thread::{ThreadManager, ThreadState, ThreadTurn};
use crate::errors::{ProviderError, SummaryError};
use crate::handlers::{ChatContext, HandlerRegistry};
use crate::prompt::build_summary_prompt;

/// Owns all per-chat state and drives summarization requests against it.
///
/// Safe to share behind an `Arc`: chat mutation is serialized per chat,
/// while summaries of the same chat run concurrently against snapshots.
pub struct Coordinator {
    chats: ChatStore,
    threads: ThreadManager,
    classifier: ContentClassifier,
    registry: HandlerRegistry,
    completion: Arc<dyn TextCompletion>,
    composer: Composer,
    handler_timeout: Duration,
    summary_timeout: Duration,
    idle_ttl: Duration,
}

impl Coordinator {
    /// Wire the standard handler set from `config` against `capabilities`.
    #[must_use]
    pub fn new(
        config: &AppConfig,
        completion: Arc<dyn TextCompletion>,
        capabilities: &Capabilities,
    ) -> Self {
        Self::with_registry(
            config,
            completion,
            HandlerRegistry::from_config(config, capabilities),
        )
    }

    #[must_use]
    pub fn with_registry(
        config: &AppConfig,
        completion: Arc<dyn TextCompletion>,
        registry: HandlerRegistry,
    ) -> Self {
        Self {
            chats: ChatStore::new(config.max_messages_per_chat, config.default_tone),
            threads: ThreadManager::new(),
            classifier: ContentClassifier::from_config(config),
            registry,
            completion,
            composer: Composer::new(),
            handler_timeout: config.handler_timeout,
            summary_timeout: config.summary_timeout,
            idle_ttl: config.chat_idle_ttl,
        }
    }

    pub async fn ingest(&self, message: Message) {
        self.chats.ingest(message).await;
    }

    pub async fn set_tone(&self, chat_id: &ChatId, tone: Tone) {
        self.chats.set_tone(chat_id, tone).await;
    }

    /// Current tone for the chat, `None` if the chat is unknown.
    pub async fn tone(&self, chat_id: &ChatId) -> Option<Tone> {
        self.chats.tone(chat_id).await
    }

    pub async fn history_len(&self, chat_id: &ChatId) -> usize {
        self.chats.history_len(chat_id).await
    }

    #[must_use]
    pub fn thread_state(&self, chat_id: &ChatId) -> ThreadState {
        self.threads.state(chat_id)
    }

    #[must_use]
    pub fn thread_turns(&self, chat_id: &ChatId) -> usize {
        self.threads.turn_count(chat_id)
    }

    pub fn reset_thread(&self, chat_id: &ChatId) {
        self.threads.reset(chat_id);
    }

    /// Summarize the trailing window of a chat.
    ///
    /// # Errors
    ///
    /// `UnknownChat` when the chat has no messages, `SummarizationFailed`
    /// when the base summary cannot be produced.
    pub async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResult, SummaryError> {
        self.run(request).await
    }

    /// Like [`Coordinator::summarize`], abandoning the request when `token`
    /// fires. In-flight handler and completion calls are dropped and the
    /// chat's thread is left untouched.
    ///
    /// # Errors
    ///
    /// As `summarize`, plus `Cancelled`.
    pub async fn summarize_with_cancel(
        &self,
        request: &SummaryRequest,
        token: &CancellationToken,
    ) -> Result<SummaryResult, SummaryError> {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                info!("Summarization for chat {} cancelled", request.chat_id);
                Err(SummaryError::Cancelled)
            }
            result = self.run(request) => result,
        }
    }

    async fn run(&self, request: &SummaryRequest) -> Result<SummaryResult, SummaryError> {
        let chat_id = &request.chat_id;
        let snapshot = self
            .chats
            .snapshot(chat_id, request.window_size)
            .await
            .ok_or_else(|| SummaryError::UnknownChat(chat_id.clone()))?;
        let tone = request.tone_override.unwrap_or(snapshot.tone);

        let signals = self.classifier.classify(&snapshot.window);
        info!(
            "Classified {} messages in chat {} into {} signals",
            snapshot.window.len(),
            chat_id,
            signals.len()
        );

        let context = ChatContext {
            chat_id: chat_id.clone(),
            tone,
            window: Arc::from(snapshot.window),
        };
        let contributions =
            dispatch_all(&self.registry, &signals, &context, self.handler_timeout).await;

        let profile_notes: Vec<String> = contributions
            .iter()
            .filter(|c| c.signal.kind() == SignalKind::ProfileReferenceable)
            .map(|c| c.text.clone())
            .collect();
        let prompt = build_summary_prompt(&context.window, tone, &profile_notes);

        let thread = self.threads.peek(chat_id);
        let base = match tokio::time::timeout(
            self.summary_timeout,
            self.completion.complete(&prompt, &thread),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                error!("Base summary failed for chat {}: {}", chat_id, e);
                return Err(SummaryError::SummarizationFailed(e));
            }
            Err(_) => {
                error!(
                    "Base summary for chat {} timed out after {:?}",
                    chat_id, self.summary_timeout
                );
                return Err(SummaryError::SummarizationFailed(ProviderError::Timeout(
                    self.summary_timeout,
                )));
            }
        };

        let text = self.composer.compose(&base, &contributions, tone);
        info!(
            "Composed {} summary for chat {} with {} contributions",
            tone,
            chat_id,
            contributions.len()
        );

        let committed = self.threads.commit(
            chat_id,
            &thread,
            ThreadTurn {
                request: prompt.input,
                reply: base,
                at: Utc::now(),
            },
        );
        if !committed {
            warn!(
                "Thread for chat {} was reset or rebound during summarization; turn not recorded",
                chat_id
            );
        }

        let mut contributing_signals: Vec<ContentSignal> = Vec::new();
        for contribution in contributions {
            if !contributing_signals.contains(&contribution.signal) {
                contributing_signals.push(contribution.signal);
            }
        }

        Ok(SummaryResult {
            text,
            contributing_signals,
        })
    }

    /// Evict chats idle for longer than the configured TTL, releasing their
    /// threads too.
    pub fn evict_idle(&self) -> Vec<ChatId> {
        let ttl = chrono::Duration::from_std(self.idle_ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.evict_idle_before(cutoff)
    }

    /// Evict chats idle since before `cutoff`. Each thread is released while
    /// its chat is still held, so a chat recreated right after eviction keeps
    /// its new thread.
    pub fn evict_idle_before(&self, cutoff: DateTime<Utc>) -> Vec<ChatId> {
        self.chats
            .evict_idle_before(cutoff, |chat_id| self.threads.reset(chat_id))
    }

    /// Drop every chat and thread. Returns how many chats were removed.
    pub async fn reset_all(&self) -> usize {
        let removed = self.chats.reset_all().await;
        self.threads.reset_all();
        removed.len()
    }

    #[must_use]
    pub fn chat_count(&self) -> usize {
        self.chats.chat_count()
    }

    /// Run [`Coordinator::evict_idle`] every `every` until `shutdown` fires.
    pub fn spawn_idle_sweeper(
        self: Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("Idle sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle();
                        if !evicted.is_empty() {
                            debug!("Idle sweeper evicted {:?}", evicted);
                        }
                    }
                }
            }
        })
    }
}
