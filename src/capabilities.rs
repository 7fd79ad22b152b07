//! External capabilities the orchestration core depends on.
//!
//! Production implementations live in `ai` and `clients`; tests supply their
//! own. Core logic never checks which one it was given.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::thread::ThreadContext;
use crate::errors::ProviderError;

/// A prompt for the completion capability: standing instructions plus the
/// request body for this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPrompt {
    pub instructions: String,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(
        &self,
        prompt: &CompletionPrompt,
        context: &ThreadContext,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ProviderError>;
}

/// Largest image handed to the vision capability. Attachment downloads are
/// capped at the same size.
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

#[async_trait]
pub trait ImageDescribe: Send + Sync {
    /// Describe an already fetched image. `mime` is the sniffed type of
    /// `bytes`; `attachment_ref` is only used for logging.
    async fn describe(
        &self,
        attachment_ref: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// `None` when no profile is known for the user.
    async fn lookup(&self, user_id: &str) -> Option<String>;
}

#[async_trait]
pub trait FetchAttachment: Send + Sync {
    async fn fetch(&self, attachment_ref: &str) -> Result<Vec<u8>, ProviderError>;
}

/// The capability set handlers are wired against.
#[derive(Clone)]
pub struct Capabilities {
    pub web_search: Arc<dyn WebSearch>,
    pub vision: Arc<dyn ImageDescribe>,
    pub profiles: Arc<dyn ProfileLookup>,
    pub attachments: Arc<dyn FetchAttachment>,
}
