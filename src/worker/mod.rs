//! Request orchestration: classification, handler fan-out, composition and
//! thread bookkeeping.

pub mod coordinator;
mod dispatch;

pub use coordinator::Coordinator;

/// Canonical failure message shown to users when summarization fails.
pub const CANONICAL_FAILURE_MESSAGE: &str =
    "Sorry, I couldn't generate a summary at this time. Please try again later.";
