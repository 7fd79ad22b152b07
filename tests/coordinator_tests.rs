use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use paraphrase::capabilities::{
    Capabilities, CompletionPrompt, FetchAttachment, ImageDescribe, SearchResult, TextCompletion,
    WebSearch,
};
use paraphrase::clients::StaticProfileStore;
use paraphrase::core::config::AppConfig;
use paraphrase::core::models::{
    Attachment, AttachmentKind, ChatId, ContentSignal, HandlerContribution, Message, SignalKind,
    SummaryRequest, Tone,
};
use paraphrase::core::thread::{ThreadContext, ThreadState};
use paraphrase::errors::{ProviderError, SummaryError};
use paraphrase::handlers::{ChatContext, Handler, HandlerRegistry, LinkHandler, TopicHandler};
use paraphrase::worker::Coordinator;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

const BASE: &str = "Base summary.";

// ─────────────────────────────────────────────────────────────────────────────
// Test doubles
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeCompletion {
    prompts: Mutex<Vec<CompletionPrompt>>,
    prior_turns: Mutex<Vec<usize>>,
    fail: AtomicBool,
    delay: Duration,
    started: Notify,
}

impl FakeCompletion {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn last_prompt(&self) -> CompletionPrompt {
        self.prompts.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl TextCompletion for FakeCompletion {
    async fn complete(
        &self,
        prompt: &CompletionPrompt,
        context: &ThreadContext,
    ) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.prior_turns.lock().unwrap().push(context.turns.len());
        self.started.notify_one();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::OpenAI("model unavailable".to_string()));
        }
        Ok(BASE.to_string())
    }
}

/// Fails like a machine with no network.
struct OfflineSearch;

#[async_trait]
impl WebSearch for OfflineSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, ProviderError> {
        Err(ProviderError::Http("network unavailable".to_string()))
    }
}

/// Reachable, but finds nothing.
struct EmptySearch;

#[async_trait]
impl WebSearch for EmptySearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, ProviderError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct CountingVision {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageDescribe for CountingVision {
    async fn describe(
        &self,
        _attachment_ref: &str,
        _mime: &str,
        _bytes: &[u8],
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("a cat".to_string())
    }
}

struct NoAttachments;

#[async_trait]
impl FetchAttachment for NoAttachments {
    async fn fetch(&self, attachment_ref: &str) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::NotFound(attachment_ref.to_string()))
    }
}

struct AlwaysAbstain;

#[async_trait]
impl Handler for AlwaysAbstain {
    fn name(&self) -> &'static str {
        "abstain"
    }

    async fn handle(&self, _signal: &ContentSignal, _context: &ChatContext) -> HandlerContribution {
        HandlerContribution::abstain("never has anything to say")
    }
}

/// Echoes the signal back after a per-URL delay, recording each call.
#[derive(Default)]
struct EchoHandler {
    delays: HashMap<String, Duration>,
    seen: Mutex<Vec<ContentSignal>>,
}

#[async_trait]
impl Handler for EchoHandler {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn handle(&self, signal: &ContentSignal, _context: &ChatContext) -> HandlerContribution {
        self.seen.lock().unwrap().push(signal.clone());
        let ContentSignal::Link { url } = signal else {
            return HandlerContribution::abstain("links only");
        };
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        HandlerContribution::contributed(signal, format!("seen {url}"), 1.0)
    }
}

struct Stuck;

#[async_trait]
impl Handler for Stuck {
    fn name(&self) -> &'static str {
        "stuck"
    }

    async fn handle(&self, signal: &ContentSignal, _context: &ChatContext) -> HandlerContribution {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        HandlerContribution::contributed(signal, "too late", 1.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn chat() -> ChatId {
    ChatId::from("chat-1")
}

fn msg(id: usize, sender: &str, text: &str) -> Message {
    Message {
        id: id.to_string(),
        chat_id: chat(),
        sender_id: sender.to_string(),
        timestamp: Utc::now(),
        text: text.to_string(),
        attachments: Vec::new(),
    }
}

fn request() -> SummaryRequest {
    SummaryRequest {
        chat_id: chat(),
        window_size: 50,
        tone_override: None,
    }
}

fn coordinator_with(
    config: &AppConfig,
    completion: &Arc<FakeCompletion>,
    registry: HandlerRegistry,
) -> Coordinator {
    Coordinator::with_registry(config, completion.clone(), registry)
}

/// Link lookups fail, topic lookups find nothing.
fn offline_registry() -> HandlerRegistry {
    HandlerRegistry::builder()
        .register(SignalKind::Link, Arc::new(LinkHandler::new(Arc::new(OfflineSearch))))
        .register(
            SignalKind::TopicReference,
            Arc::new(TopicHandler::new(Arc::new(EmptySearch))),
        )
        .build()
}

async fn ingest_all(coordinator: &Coordinator, texts: &[&str]) {
    for (i, text) in texts.iter().enumerate() {
        coordinator.ingest(msg(i, "alice", text)).await;
    }
}

fn sports_signal() -> ContentSignal {
    ContentSignal::TopicReference {
        domain: "sports".to_string(),
        confidence: 0.6,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_history_is_capped_to_most_recent_messages() {
    let config = AppConfig {
        max_messages_per_chat: 3,
        ..AppConfig::default()
    };
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&config, &completion, HandlerRegistry::default());

    ingest_all(&coordinator, &["one", "two", "three", "four", "five"]).await;
    assert_eq!(coordinator.history_len(&chat()).await, 3);

    coordinator.summarize(&request()).await.unwrap();
    let input = completion.last_prompt().input;
    assert!(!input.contains(": one") && !input.contains(": two"));
    assert!(input.contains(": three") && input.contains(": five"));
}

#[tokio::test]
async fn test_unknown_chat_is_not_a_summarization_failure() {
    let completion = Arc::new(FakeCompletion::default());
    completion.fail.store(true, Ordering::SeqCst);
    let coordinator = coordinator_with(&AppConfig::default(), &completion, offline_registry());

    let err = coordinator.summarize(&request()).await.unwrap_err();
    assert!(matches!(err, SummaryError::UnknownChat(ref id) if *id == chat()));

    // A tone alone does not make the chat summarizable.
    coordinator.set_tone(&chat(), Tone::Chaotic).await;
    let err = coordinator.summarize(&request()).await.unwrap_err();
    assert!(matches!(err, SummaryError::UnknownChat(_)));
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_stoic_summary_with_offline_link_and_empty_match_search() {
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, offline_registry());
    ingest_all(
        &coordinator,
        &["hi", "check https://x.com/1", "great match today"],
    )
    .await;

    let result = coordinator.summarize(&request()).await.unwrap();

    assert_eq!(
        result.text,
        "Base summary.\n\nAdditional context:\n- Match context: none found"
    );
    assert_eq!(result.contributing_signals, vec![sports_signal()]);
    assert_eq!(coordinator.thread_turns(&chat()), 1);
}

#[tokio::test]
async fn test_identical_windows_give_identical_results() {
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, offline_registry());
    ingest_all(
        &coordinator,
        &["Spurs 2-1 Arsenal", "see https://example.com/report", "hi"],
    )
    .await;

    let first = coordinator.summarize(&request()).await.unwrap();
    let second = coordinator.summarize(&request()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_contribution_order_follows_the_window_not_completion_order() {
    let echo = Arc::new(EchoHandler {
        delays: HashMap::from([
            ("https://a.example/1".to_string(), Duration::from_secs(5)),
            ("https://a.example/2".to_string(), Duration::from_millis(1)),
        ]),
        seen: Mutex::default(),
    });
    let registry = HandlerRegistry::builder()
        .register(SignalKind::Link, echo.clone())
        .build();
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, registry);
    ingest_all(
        &coordinator,
        &["first https://a.example/1", "then https://a.example/2"],
    )
    .await;

    let result = coordinator.summarize(&request()).await.unwrap();
    assert_eq!(
        result.text,
        "Base summary.\n\nAdditional context:\n- seen https://a.example/1\n- seen https://a.example/2"
    );
}

#[tokio::test]
async fn test_abstaining_handlers_leave_the_base_summary_untouched() {
    let registry = HandlerRegistry::builder()
        .register(SignalKind::Link, Arc::new(AlwaysAbstain))
        .register(SignalKind::TopicReference, Arc::new(AlwaysAbstain))
        .register(SignalKind::Image, Arc::new(AlwaysAbstain))
        .build();
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, registry);
    ingest_all(
        &coordinator,
        &["https://example.com/a", "what a goal, 3-0 in the derby"],
    )
    .await;

    let result = coordinator.summarize(&request()).await.unwrap();
    assert_eq!(result.text, BASE);
    assert!(result.contributing_signals.is_empty());
}

#[tokio::test]
async fn test_tone_changes_only_base_formatting() {
    let echo = Arc::new(EchoHandler::default());
    let registry = HandlerRegistry::builder()
        .register(SignalKind::Link, echo.clone())
        .build();
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, registry);
    ingest_all(&coordinator, &["https://example.com/a", "lunch?"]).await;

    let stoic = coordinator.summarize(&request()).await.unwrap();
    let stoic_prompt = completion.last_prompt();

    coordinator.set_tone(&chat(), Tone::Chaotic).await;
    assert_eq!(coordinator.tone(&chat()).await, Some(Tone::Chaotic));
    let chaotic = coordinator.summarize(&request()).await.unwrap();
    let chaotic_prompt = completion.last_prompt();

    assert_eq!(stoic.contributing_signals, chaotic.contributing_signals);
    let seen = echo.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);

    assert!(stoic_prompt.instructions.contains("TONE (stoic)"));
    assert!(chaotic_prompt.instructions.contains("TONE (chaotic)"));
    let messages = |p: &CompletionPrompt| p.input.split("Messages:\n").nth(1).unwrap().to_string();
    assert_eq!(messages(&stoic_prompt), messages(&chaotic_prompt));
}

#[tokio::test]
async fn test_tone_override_applies_to_one_request() {
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, HandlerRegistry::default());
    ingest_all(&coordinator, &["hi"]).await;

    let mut req = request();
    req.tone_override = Some(Tone::Pubbie);
    coordinator.summarize(&req).await.unwrap();
    assert!(completion.last_prompt().instructions.contains("TONE (pubbie)"));
    assert_eq!(coordinator.tone(&chat()).await, Some(Tone::Stoic));
}

#[tokio::test(start_paused = true)]
async fn test_messages_ingested_mid_request_are_not_summarized() {
    let completion = Arc::new(FakeCompletion::slow(Duration::from_secs(10)));
    let coordinator = Arc::new(coordinator_with(
        &AppConfig::default(),
        &completion,
        HandlerRegistry::default(),
    ));
    ingest_all(&coordinator, &["early bird"]).await;

    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.summarize(&request()).await })
    };
    completion.started.notified().await;
    coordinator.ingest(msg(99, "bob", "late arrival")).await;

    running.await.unwrap().unwrap();
    let input = completion.last_prompt().input;
    assert!(input.contains("early bird"));
    assert!(!input.contains("late arrival"));
    assert_eq!(coordinator.history_len(&chat()).await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_requests_commit_nothing() {
    let completion = Arc::new(FakeCompletion::slow(Duration::from_secs(60)));
    let coordinator = Arc::new(coordinator_with(
        &AppConfig::default(),
        &completion,
        HandlerRegistry::default(),
    ));
    ingest_all(&coordinator, &["hello"]).await;

    let token = CancellationToken::new();
    let running = {
        let coordinator = Arc::clone(&coordinator);
        let token = token.clone();
        tokio::spawn(async move { coordinator.summarize_with_cancel(&request(), &token).await })
    };
    completion.started.notified().await;
    token.cancel();

    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, SummaryError::Cancelled));
    assert_eq!(coordinator.thread_turns(&chat()), 0);
    assert_eq!(coordinator.thread_state(&chat()), ThreadState::Uninitialized);
}

#[tokio::test]
async fn test_failed_first_request_leaves_the_thread_uninitialized() {
    let completion = Arc::new(FakeCompletion::default());
    completion.fail.store(true, Ordering::SeqCst);
    let coordinator = coordinator_with(&AppConfig::default(), &completion, HandlerRegistry::default());
    ingest_all(&coordinator, &["hello"]).await;

    assert!(coordinator.summarize(&request()).await.is_err());
    assert_eq!(coordinator.thread_state(&chat()), ThreadState::Uninitialized);

    completion.fail.store(false, Ordering::SeqCst);
    coordinator.summarize(&request()).await.unwrap();
    assert!(matches!(
        coordinator.thread_state(&chat()),
        ThreadState::Active(_)
    ));
    assert_eq!(coordinator.thread_turns(&chat()), 1);
}

#[tokio::test]
async fn test_base_failure_leaves_the_thread_as_it_was() {
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, HandlerRegistry::default());
    ingest_all(&coordinator, &["hello"]).await;

    coordinator.summarize(&request()).await.unwrap();
    let before = coordinator.thread_state(&chat());
    assert!(matches!(before, ThreadState::Active(_)));
    assert_eq!(coordinator.thread_turns(&chat()), 1);

    completion.fail.store(true, Ordering::SeqCst);
    let err = coordinator.summarize(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        SummaryError::SummarizationFailed(ProviderError::OpenAI(_))
    ));
    assert_eq!(coordinator.thread_state(&chat()), before);
    assert_eq!(coordinator.thread_turns(&chat()), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_base_summary_times_out() {
    let config = AppConfig {
        summary_timeout: Duration::from_secs(5),
        ..AppConfig::default()
    };
    let completion = Arc::new(FakeCompletion::slow(Duration::from_secs(60)));
    let coordinator = coordinator_with(&config, &completion, HandlerRegistry::default());
    ingest_all(&coordinator, &["hello"]).await;

    let err = coordinator.summarize(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        SummaryError::SummarizationFailed(ProviderError::Timeout(d)) if d == Duration::from_secs(5)
    ));
    assert_eq!(coordinator.thread_turns(&chat()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_handler_timeout_counts_as_abstain() {
    let config = AppConfig {
        handler_timeout: Duration::from_secs(1),
        ..AppConfig::default()
    };
    let registry = HandlerRegistry::builder()
        .register(SignalKind::Link, Arc::new(Stuck))
        .build();
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&config, &completion, registry);
    ingest_all(&coordinator, &["https://example.com/slow"]).await;

    let result = coordinator.summarize(&request()).await.unwrap();
    assert_eq!(result.text, BASE);
    assert!(result.contributing_signals.is_empty());
}

#[tokio::test]
async fn test_threads_carry_context_until_reset() {
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, HandlerRegistry::default());
    ingest_all(&coordinator, &["hello"]).await;

    assert_eq!(coordinator.thread_state(&chat()), ThreadState::Uninitialized);
    coordinator.summarize(&request()).await.unwrap();
    let first = coordinator.thread_state(&chat());
    coordinator.summarize(&request()).await.unwrap();
    assert_eq!(coordinator.thread_state(&chat()), first);

    coordinator.reset_thread(&chat());
    assert_eq!(coordinator.thread_state(&chat()), ThreadState::Uninitialized);
    coordinator.summarize(&request()).await.unwrap();
    assert_ne!(coordinator.thread_state(&chat()), first);

    assert_eq!(*completion.prior_turns.lock().unwrap(), vec![0, 1, 0]);
}

#[tokio::test]
async fn test_idle_chats_are_evicted_with_their_threads() {
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, HandlerRegistry::default());
    ingest_all(&coordinator, &["hello"]).await;
    coordinator.summarize(&request()).await.unwrap();

    // Nothing is idle for an hour yet.
    assert!(coordinator.evict_idle().is_empty());

    let evicted = coordinator.evict_idle_before(Utc::now() + chrono::Duration::seconds(1));
    assert_eq!(evicted, vec![chat()]);
    assert_eq!(coordinator.chat_count(), 0);
    assert_eq!(coordinator.thread_state(&chat()), ThreadState::Uninitialized);
    assert!(matches!(
        coordinator.summarize(&request()).await.unwrap_err(),
        SummaryError::UnknownChat(_)
    ));
}

#[tokio::test]
async fn test_eviction_keeps_threads_of_chats_that_stay() {
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, HandlerRegistry::default());
    ingest_all(&coordinator, &["hello"]).await;
    coordinator.summarize(&request()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let cutoff = Utc::now();

    let busy = ChatId::from("chat-2");
    let mut other = msg(1, "bob", "hey");
    other.chat_id = busy.clone();
    coordinator.ingest(other).await;
    coordinator
        .summarize(&SummaryRequest {
            chat_id: busy.clone(),
            ..request()
        })
        .await
        .unwrap();
    let busy_thread = coordinator.thread_state(&busy);

    assert_eq!(coordinator.evict_idle_before(cutoff), vec![chat()]);
    assert_eq!(coordinator.thread_state(&chat()), ThreadState::Uninitialized);
    assert_eq!(coordinator.thread_state(&busy), busy_thread);
    assert_eq!(coordinator.thread_turns(&busy), 1);
}

#[tokio::test]
async fn test_reset_all_forgets_every_chat() {
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = coordinator_with(&AppConfig::default(), &completion, HandlerRegistry::default());
    ingest_all(&coordinator, &["hello"]).await;
    let mut other = msg(1, "bob", "hey");
    other.chat_id = ChatId::from("chat-2");
    coordinator.ingest(other).await;
    coordinator.summarize(&request()).await.unwrap();

    assert_eq!(coordinator.reset_all().await, 2);
    assert_eq!(coordinator.chat_count(), 0);
    assert_eq!(coordinator.thread_state(&chat()), ThreadState::Uninitialized);
}

#[tokio::test]
async fn test_profiles_feed_the_prompt_and_images_respect_the_switch() {
    let config = AppConfig {
        profile_user_ids: ["U1".to_string()].into_iter().collect(),
        enable_image_analysis: false,
        ..AppConfig::default()
    };
    let vision = Arc::new(CountingVision::default());
    let capabilities = Capabilities {
        web_search: Arc::new(OfflineSearch),
        vision: vision.clone(),
        profiles: Arc::new(StaticProfileStore::new(HashMap::from([(
            "U1".to_string(),
            "Arsenal season ticket holder".to_string(),
        )]))),
        attachments: Arc::new(NoAttachments),
    };
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = Coordinator::new(&config, completion.clone(), &capabilities);

    let mut photo = msg(0, "U1", "look at this");
    photo.attachments.push(Attachment {
        kind: AttachmentKind::Image,
        reference: "https://cdn.example/cat.png".to_string(),
    });
    coordinator.ingest(photo).await;

    let result = coordinator.summarize(&request()).await.unwrap();
    assert_eq!(result.text, BASE);
    assert_eq!(
        result.contributing_signals,
        vec![ContentSignal::ProfileReferenceable {
            user_id: "U1".to_string()
        }]
    );
    assert!(
        completion
            .last_prompt()
            .input
            .ends_with("Participant notes:\n- U1: Arsenal season ticket holder")
    );
    assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_sweeper_stops_on_shutdown() {
    let completion = Arc::new(FakeCompletion::default());
    let coordinator = Arc::new(coordinator_with(
        &AppConfig::default(),
        &completion,
        HandlerRegistry::default(),
    ));
    let shutdown = CancellationToken::new();
    let sweeper = Arc::clone(&coordinator).spawn_idle_sweeper(Duration::from_secs(60), shutdown.clone());

    tokio::time::sleep(Duration::from_secs(180)).await;
    shutdown.cancel();
    sweeper.await.unwrap();
}
