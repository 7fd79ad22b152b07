//! Content classification over a message window.
//!
//! Pure and deterministic: the same window always yields the same signals in
//! the same order. Signals are ordered by where they first appear in the
//! window, which is the order contributions are later merged in.

use std::collections::HashSet;

use tracing::debug;

use crate::core::config::AppConfig;
use crate::core::models::{AttachmentKind, ContentSignal, Message};
use crate::utils::links::{extract_links_from_text, normalize_and_dedupe_links};
use crate::utils::mime::{guess_mime_from_reference, is_supported_image_mime};
use crate::utils::sports;

pub const SPORTS_DOMAIN: &str = "sports";

#[derive(Debug, Clone)]
pub struct ContentClassifier {
    max_links: usize,
    profile_eligible: HashSet<String>,
}

impl ContentClassifier {
    #[must_use]
    pub fn new(max_links: usize, profile_eligible: HashSet<String>) -> Self {
        Self {
            max_links,
            profile_eligible,
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.max_links_per_summary, config.profile_user_ids.clone())
    }

    #[must_use]
    pub fn classify(&self, window: &[Message]) -> Vec<ContentSignal> {
        let mut signals: Vec<ContentSignal> = Vec::new();

        // Topic evidence is aggregated over the whole window but the signal
        // is placed where the topic first comes up.
        let mut topic_first_at: Option<usize> = None;
        let mut topic_confidence: f32 = 0.0;
        for (idx, msg) in window.iter().enumerate() {
            if let Some(confidence) = sports::assess(&msg.text) {
                topic_first_at.get_or_insert(idx);
                topic_confidence = topic_confidence.max(confidence);
            }
        }

        let mut seen_links: HashSet<String> = HashSet::new();
        let mut seen_images: HashSet<&str> = HashSet::new();
        let mut seen_senders: HashSet<&str> = HashSet::new();
        let mut link_count = 0usize;

        for (idx, msg) in window.iter().enumerate() {
            if self.profile_eligible.contains(&msg.sender_id)
                && seen_senders.insert(msg.sender_id.as_str())
            {
                signals.push(ContentSignal::ProfileReferenceable {
                    user_id: msg.sender_id.clone(),
                });
            }

            for url in normalize_and_dedupe_links(extract_links_from_text(&msg.text)) {
                if link_count >= self.max_links {
                    break;
                }
                if seen_links.insert(url.clone()) {
                    link_count += 1;
                    signals.push(ContentSignal::Link { url });
                }
            }

            if topic_first_at == Some(idx) {
                signals.push(ContentSignal::TopicReference {
                    domain: SPORTS_DOMAIN.to_string(),
                    confidence: topic_confidence,
                });
            }

            for attachment in &msg.attachments {
                if is_image_attachment(attachment.kind, &attachment.reference)
                    && seen_images.insert(attachment.reference.as_str())
                {
                    signals.push(ContentSignal::Image {
                        attachment_ref: attachment.reference.clone(),
                    });
                }
            }
        }

        debug!(
            "Classified {} messages into {} signals",
            window.len(),
            signals.len()
        );
        signals
    }
}

/// Photos always count; documents count when their name says they are a
/// supported image.
fn is_image_attachment(kind: AttachmentKind, reference: &str) -> bool {
    match kind {
        AttachmentKind::Image => true,
        AttachmentKind::Document => {
            guess_mime_from_reference(reference).is_some_and(|m| is_supported_image_mime(&m))
        }
        _ => false,
    }
}
