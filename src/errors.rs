use std::time::Duration;

use openai_api_rs::v1::error::APIError;
use thiserror::Error;

use crate::core::models::ChatId;

/// Failure of an external capability (completion, search, vision, fetch).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Failed to send HTTP request: {0}")]
    Http(String),

    #[error("Failed to access OpenAI API: {0}")]
    OpenAI(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed provider data: {0}")]
    Malformed(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::Http(error.to_string())
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(error: anyhow::Error) -> Self {
        ProviderError::OpenAI(error.to_string())
    }
}

impl From<APIError> for ProviderError {
    fn from(error: APIError) -> Self {
        ProviderError::OpenAI(format!("OpenAI API error: {}", error))
    }
}

/// Errors surfaced to the caller of the coordinator.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("No messages have been seen for chat {0}; send some messages before asking for a summary")]
    UnknownChat(ChatId),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(#[source] ProviderError),

    #[error("Summarization was cancelled")]
    Cancelled,
}
