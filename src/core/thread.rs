//! Conversation threads, one per chat.
//!
//! A chat's thread is `Uninitialized` until the first summarization commits
//! a turn to it, then `Active` with a bound handle until it is reset. Reading
//! a thread never creates one. Every operation here is synchronous, so no
//! lock on a thread is ever held across an await.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::ChatId;

/// Number of completed exchanges replayed to the completion capability.
pub const MAX_THREAD_TURNS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadHandle(Uuid);

impl ThreadHandle {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "thread-{}", self.0)
    }
}

/// One completed request/reply exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadTurn {
    pub request: String,
    pub reply: String,
    pub at: DateTime<Utc>,
}

/// Read-only view of a thread handed to the completion capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadContext {
    pub handle: ThreadHandle,
    pub turns: Vec<ThreadTurn>,
    /// No thread existed when this context was read. A commit against it
    /// creates the thread under `handle`.
    pub provisional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Uninitialized,
    Active(ThreadHandle),
}

struct ActiveThread {
    handle: ThreadHandle,
    turns: Vec<ThreadTurn>,
}

#[derive(Default)]
pub struct ThreadManager {
    threads: DashMap<ChatId, ActiveThread>,
}

impl ThreadManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the chat's thread without creating it. An uninitialized chat
    /// gets an empty provisional context with a handle of its own.
    #[must_use]
    pub fn peek(&self, chat_id: &ChatId) -> ThreadContext {
        match self.threads.get(chat_id) {
            Some(thread) => ThreadContext {
                handle: thread.handle,
                turns: thread.turns.clone(),
                provisional: false,
            },
            None => ThreadContext {
                handle: ThreadHandle::fresh(),
                turns: Vec::new(),
                provisional: true,
            },
        }
    }

    /// Release the chat's thread. The next commit starts a new one.
    pub fn reset(&self, chat_id: &ChatId) {
        match self.threads.remove(chat_id) {
            Some((_, thread)) => info!("Reset {} for chat {}", thread.handle, chat_id),
            None => debug!("Reset requested for chat {} with no thread", chat_id),
        }
    }

    /// Record a completed exchange on the thread `context` was read from.
    ///
    /// A provisional context binds a new thread on its first commit. Returns
    /// `false` without changing anything when the thread has been reset, or
    /// bound to another handle, since `context` was read.
    pub fn commit(&self, chat_id: &ChatId, context: &ThreadContext, turn: ThreadTurn) -> bool {
        match self.threads.entry(chat_id.clone()) {
            Entry::Vacant(slot) => {
                if !context.provisional {
                    debug!("Dropping commit for chat {}: thread was reset", chat_id);
                    return false;
                }
                info!("Created {} for chat {}", context.handle, chat_id);
                slot.insert(ActiveThread {
                    handle: context.handle,
                    turns: vec![turn],
                });
                true
            }
            Entry::Occupied(mut slot) => {
                let thread = slot.get_mut();
                if thread.handle != context.handle {
                    debug!(
                        "Dropping commit for chat {}: {} superseded by {}",
                        chat_id, context.handle, thread.handle
                    );
                    return false;
                }
                thread.turns.push(turn);
                let excess = thread.turns.len().saturating_sub(MAX_THREAD_TURNS);
                if excess > 0 {
                    thread.turns.drain(..excess);
                }
                debug!(
                    "Committed turn to {} ({} turns)",
                    thread.handle,
                    thread.turns.len()
                );
                true
            }
        }
    }

    #[must_use]
    pub fn state(&self, chat_id: &ChatId) -> ThreadState {
        self.threads
            .get(chat_id)
            .map_or(ThreadState::Uninitialized, |t| ThreadState::Active(t.handle))
    }

    /// Committed turns on the chat's thread; zero when uninitialized.
    #[must_use]
    pub fn turn_count(&self, chat_id: &ChatId) -> usize {
        self.threads.get(chat_id).map_or(0, |t| t.turns.len())
    }

    pub fn reset_all(&self) {
        self.threads.clear();
    }
}
