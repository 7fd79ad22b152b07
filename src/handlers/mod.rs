//! Specialized handlers: one capability, many independent variants.
//!
//! A handler turns one signal into a contribution or abstains. Whatever goes
//! wrong inside (provider errors, malformed data, missing records) is folded
//! into an abstain before it leaves `handle`.

pub mod image;
pub mod link;
pub mod profile;
pub mod registry;
pub mod topic;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::models::{ChatId, ContentSignal, HandlerContribution, Message, Tone};

pub use image::ImageHandler;
pub use link::LinkHandler;
pub use profile::ProfileHandler;
pub use registry::HandlerRegistry;
pub use topic::TopicHandler;

/// Read-only view of the chat a handler runs against.
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub chat_id: ChatId,
    pub tone: Tone,
    pub window: Arc<[Message]>,
}

#[async_trait]
pub trait Handler: Send + Sync {
    /// Short stable name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, signal: &ContentSignal, context: &ChatContext) -> HandlerContribution;
}

/// Shorthand for the abstain a handler returns when routed a signal it does
/// not understand.
pub(crate) fn wrong_signal(handler: &str, signal: &ContentSignal) -> HandlerContribution {
    HandlerContribution::abstain(format!(
        "{} handler cannot process {} signals",
        handler,
        signal.kind()
    ))
}
