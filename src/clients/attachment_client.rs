use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::debug;

use crate::capabilities::{FetchAttachment, MAX_IMAGE_BYTES};
use crate::errors::ProviderError;

static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
});

/// Default cap on a single downloaded attachment, matching what the vision
/// capability accepts.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = MAX_IMAGE_BYTES;

/// Resolves http(s) attachment references by downloading them into memory
/// with a strict size cap. Any other reference is `NotFound`.
#[derive(Debug, Clone)]
pub struct HttpAttachmentFetcher {
    max_bytes: usize,
    bearer_token: Option<String>,
}

impl Default for HttpAttachmentFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTACHMENT_BYTES)
    }
}

impl HttpAttachmentFetcher {
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            bearer_token: None,
        }
    }

    /// Send `token` as a bearer credential, for transports whose file URLs
    /// require auth.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl FetchAttachment for HttpAttachmentFetcher {
    async fn fetch(&self, attachment_ref: &str) -> Result<Vec<u8>, ProviderError> {
        if self.max_bytes == 0 {
            return Err(ProviderError::Malformed(
                "attachment max_bytes must be > 0".to_string(),
            ));
        }

        let url = url::Url::parse(attachment_ref)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| ProviderError::NotFound(format!("no download source for {attachment_ref}")))?;

        let mut request = HTTP_CLIENT.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("Failed to download attachment: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(attachment_ref.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Http(format!(
                "Attachment download HTTP {status}"
            )));
        }

        let max_bytes = self.max_bytes;
        if let Some(len) = resp.content_length()
            && len > u64::try_from(max_bytes).unwrap_or(u64::MAX)
        {
            return Err(ProviderError::Malformed(format!(
                "Attachment too large ({len}B > {max_bytes}B)"
            )));
        }

        let mut out: Vec<u8> = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| {
                ProviderError::Http(format!("Error reading attachment download stream: {e}"))
            })?;
            if out.len().saturating_add(chunk.len()) > max_bytes {
                return Err(ProviderError::Malformed(format!(
                    "Attachment too large (exceeded {max_bytes}B cap)"
                )));
            }
            out.extend_from_slice(&chunk);
        }

        debug!("Downloaded {} bytes for {}", out.len(), attachment_ref);
        Ok(out)
    }
}
