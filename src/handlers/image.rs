use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{ChatContext, Handler, wrong_signal};
use crate::capabilities::{FetchAttachment, ImageDescribe, MAX_IMAGE_BYTES};
use crate::core::models::{ContentSignal, HandlerContribution};
use crate::utils::mime::sniff_image_mime;

/// Fetches an image attachment once, validates it, and hands the bytes to
/// the vision capability.
pub struct ImageHandler {
    fetcher: Arc<dyn FetchAttachment>,
    describer: Arc<dyn ImageDescribe>,
}

impl ImageHandler {
    #[must_use]
    pub fn new(fetcher: Arc<dyn FetchAttachment>, describer: Arc<dyn ImageDescribe>) -> Self {
        Self { fetcher, describer }
    }
}

#[async_trait]
impl Handler for ImageHandler {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn handle(&self, signal: &ContentSignal, context: &ChatContext) -> HandlerContribution {
        let ContentSignal::Image { attachment_ref } = signal else {
            return wrong_signal(self.name(), signal);
        };

        let bytes = match self.fetcher.fetch(attachment_ref).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return HandlerContribution::abstain(format!(
                    "could not fetch {attachment_ref}: {e}"
                ));
            }
        };
        if bytes.is_empty() {
            return HandlerContribution::abstain(format!("{attachment_ref} is empty"));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return HandlerContribution::abstain(format!(
                "{attachment_ref} is {}B, over the {}B limit",
                bytes.len(),
                MAX_IMAGE_BYTES
            ));
        }
        let Some(mime) = sniff_image_mime(&bytes) else {
            return HandlerContribution::abstain(format!(
                "{attachment_ref} is not a supported image"
            ));
        };

        let description = match self.describer.describe(attachment_ref, mime, &bytes).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                return HandlerContribution::abstain(format!(
                    "empty description for {attachment_ref}"
                ));
            }
            Err(e) => {
                return HandlerContribution::abstain(format!(
                    "could not describe {attachment_ref}: {e}"
                ));
            }
        };

        info!(
            "Described {} image {} in chat {}",
            mime, attachment_ref, context.chat_id
        );
        HandlerContribution::contributed(signal, format!("Image: {description}"), 0.7)
    }
}
