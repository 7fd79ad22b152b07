//! Per-chat message history and tone.
//!
//! Each chat lives behind its own `RwLock`: ingestion and tone changes take
//! the write side, summarization takes the read side just long enough to
//! copy out a snapshot. Different chats never contend.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::models::{ChatId, Message, Tone};

pub struct ChatState {
    history: VecDeque<Message>,
    tone: Tone,
    cap: usize,
    last_activity_ms: AtomicI64,
    evicted: bool,
}

impl ChatState {
    fn new(tone: Tone, cap: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(cap.min(256)),
            tone,
            cap: cap.max(1),
            last_activity_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            evicted: false,
        }
    }

    fn push(&mut self, message: Message) {
        self.history.push_back(message);
        while self.history.len() > self.cap {
            self.history.pop_front();
        }
    }

    fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn idle_since_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity_ms.load(Ordering::Relaxed) < cutoff.timestamp_millis()
    }
}

/// Immutable copy of a chat taken at the start of a summarization.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub chat_id: ChatId,
    pub tone: Tone,
    pub window: Vec<Message>,
}

/// Registry of every chat the process has seen.
pub struct ChatStore {
    chats: DashMap<ChatId, Arc<RwLock<ChatState>>>,
    cap: usize,
    default_tone: Tone,
}

impl ChatStore {
    #[must_use]
    pub fn new(cap: usize, default_tone: Tone) -> Self {
        Self {
            chats: DashMap::new(),
            cap: cap.max(1),
            default_tone,
        }
    }

    fn entry(&self, chat_id: &ChatId) -> Arc<RwLock<ChatState>> {
        let entry = self.chats.entry(chat_id.clone()).or_insert_with(|| {
            debug!("Creating chat state for {}", chat_id);
            Arc::new(RwLock::new(ChatState::new(self.default_tone, self.cap)))
        });
        Arc::clone(entry.value())
    }

    fn existing(&self, chat_id: &ChatId) -> Option<Arc<RwLock<ChatState>>> {
        self.chats.get(chat_id).map(|entry| entry.value().clone())
    }

    /// Append a message to its chat, evicting the oldest beyond the cap.
    pub async fn ingest(&self, message: Message) {
        loop {
            let state = self.entry(&message.chat_id);
            let mut guard = state.write().await;
            if guard.evicted {
                // Lost a race with eviction; the map holds (or will hold) a
                // fresh entry.
                drop(guard);
                tokio::task::yield_now().await;
                continue;
            }
            debug!(
                "Ingesting message {} into chat {} ({} held)",
                message.id,
                message.chat_id,
                guard.history.len()
            );
            guard.push(message);
            guard.touch();
            return;
        }
    }

    pub async fn set_tone(&self, chat_id: &ChatId, tone: Tone) {
        loop {
            let state = self.entry(chat_id);
            let mut guard = state.write().await;
            if guard.evicted {
                drop(guard);
                tokio::task::yield_now().await;
                continue;
            }
            guard.tone = tone;
            guard.touch();
            info!("Set tone for chat {} to {}", chat_id, tone);
            return;
        }
    }

    pub async fn tone(&self, chat_id: &ChatId) -> Option<Tone> {
        let state = self.existing(chat_id)?;
        let guard = state.read().await;
        Some(guard.tone)
    }

    pub async fn history_len(&self, chat_id: &ChatId) -> usize {
        match self.existing(chat_id) {
            Some(state) => state.read().await.history.len(),
            None => 0,
        }
    }

    /// Copy out the trailing `window_size` messages and the current tone.
    ///
    /// Returns `None` when the chat has never received a message. A window of
    /// zero or one larger than the history yields the whole history.
    pub async fn snapshot(&self, chat_id: &ChatId, window_size: usize) -> Option<ChatSnapshot> {
        let state = self.existing(chat_id)?;
        let guard = state.read().await;
        if guard.evicted || guard.history.is_empty() {
            return None;
        }
        guard.touch();

        let len = guard.history.len();
        let take = if window_size == 0 || window_size > len {
            len
        } else {
            window_size
        };
        let window = guard.history.iter().skip(len - take).cloned().collect();

        Some(ChatSnapshot {
            chat_id: chat_id.clone(),
            tone: guard.tone,
            window,
        })
    }

    /// Drop chats whose last activity is older than `cutoff`. Chats that are
    /// currently locked are skipped and reconsidered on the next sweep.
    ///
    /// `on_evict` runs for each evicted chat before its slot is released, so
    /// no message for that chat can be ingested until it returns. It must not
    /// call back into this store.
    pub fn evict_idle_before(
        &self,
        cutoff: DateTime<Utc>,
        on_evict: impl Fn(&ChatId),
    ) -> Vec<ChatId> {
        let candidates: Vec<ChatId> = self
            .chats
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_read()
                    .is_ok_and(|state| state.idle_since_before(cutoff))
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = Vec::new();
        for chat_id in candidates {
            let removed = self.chats.remove_if(&chat_id, |id, state| {
                state.try_write().is_ok_and(|mut guard| {
                    if guard.idle_since_before(cutoff) {
                        guard.evicted = true;
                        on_evict(id);
                        true
                    } else {
                        false
                    }
                })
            });
            if removed.is_some() {
                evicted.push(chat_id);
            }
        }

        if !evicted.is_empty() {
            info!("Evicted {} idle chats", evicted.len());
        }
        evicted
    }

    /// Destroy every chat.
    pub async fn reset_all(&self) -> Vec<ChatId> {
        let keys: Vec<ChatId> = self.chats.iter().map(|e| e.key().clone()).collect();
        let mut removed = Vec::with_capacity(keys.len());
        for chat_id in keys {
            let Some(state) = self.existing(&chat_id) else {
                continue;
            };
            let mut guard = state.write().await;
            guard.evicted = true;
            self.chats
                .remove_if(&chat_id, |_, current| Arc::ptr_eq(current, &state));
            drop(guard);
            removed.push(chat_id);
        }
        info!("Reset {} chats", removed.len());
        removed
    }

    #[must_use]
    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }
}
