use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a group chat as handed over by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChatId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Opaque reference resolvable through `FetchAttachment` (a URL or a
    /// transport file id).
    pub reference: String,
}

/// A chat message as received from the transport. Never mutated after
/// ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: ChatId,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Stoic,
    Chaotic,
    Pubbie,
    Literal,
}

impl Tone {
    pub const ALL: [Tone; 4] = [Tone::Stoic, Tone::Chaotic, Tone::Pubbie, Tone::Literal];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Stoic => "stoic",
            Tone::Chaotic => "chaotic",
            Tone::Pubbie => "pubbie",
            Tone::Literal => "literal",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Tone::ALL
            .into_iter()
            .find(|tone| tone.as_str() == wanted)
            .ok_or_else(|| {
                let available: Vec<&str> = Tone::ALL.iter().map(|t| t.as_str()).collect();
                format!(
                    "Invalid tone '{}'. Available tones: {}",
                    s.trim(),
                    available.join(", ")
                )
            })
    }
}

/// Content category detected in a message window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentSignal {
    Link { url: String },
    Image { attachment_ref: String },
    TopicReference { domain: String, confidence: f32 },
    ProfileReferenceable { user_id: String },
}

impl ContentSignal {
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        match self {
            ContentSignal::Link { .. } => SignalKind::Link,
            ContentSignal::Image { .. } => SignalKind::Image,
            ContentSignal::TopicReference { .. } => SignalKind::TopicReference,
            ContentSignal::ProfileReferenceable { .. } => SignalKind::ProfileReferenceable,
        }
    }
}

// Confidence is derived deterministically from the window, so bitwise
// equality is the right notion for set membership.
impl Eq for ContentSignal {}

impl std::hash::Hash for ContentSignal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            ContentSignal::Link { url } => url.hash(state),
            ContentSignal::Image { attachment_ref } => attachment_ref.hash(state),
            ContentSignal::TopicReference { domain, confidence } => {
                domain.hash(state);
                confidence.to_bits().hash(state);
            }
            ContentSignal::ProfileReferenceable { user_id } => user_id.hash(state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Link,
    Image,
    TopicReference,
    ProfileReferenceable,
}

impl SignalKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Link => "link",
            SignalKind::Image => "image",
            SignalKind::TopicReference => "topic_reference",
            SignalKind::ProfileReferenceable => "profile_referenceable",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub signal: ContentSignal,
    pub text: String,
    pub confidence: f32,
}

/// What a handler hands back: either text for the merge or an explicit
/// non-contribution.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerContribution {
    Contributed(Contribution),
    Abstain { reason: String },
}

impl HandlerContribution {
    #[must_use]
    pub fn contributed(signal: &ContentSignal, text: impl Into<String>, confidence: f32) -> Self {
        HandlerContribution::Contributed(Contribution {
            signal: signal.clone(),
            text: text.into(),
            confidence,
        })
    }

    #[must_use]
    pub fn abstain(reason: impl Into<String>) -> Self {
        HandlerContribution::Abstain {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_abstain(&self) -> bool {
        matches!(self, HandlerContribution::Abstain { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub chat_id: ChatId,
    pub window_size: usize,
    #[serde(default)]
    pub tone_override: Option<Tone>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    pub text: String,
    /// Signals whose handlers contributed, in detection order.
    pub contributing_signals: Vec<ContentSignal>,
}
