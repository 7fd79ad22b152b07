use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ChatContext, Handler, wrong_signal};
use crate::capabilities::ProfileLookup;
use crate::core::models::{ContentSignal, HandlerContribution};

/// Pulls what is known about a participant so the summary can refer to them
/// in context.
pub struct ProfileHandler {
    profiles: Arc<dyn ProfileLookup>,
}

impl ProfileHandler {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileLookup>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl Handler for ProfileHandler {
    fn name(&self) -> &'static str {
        "profile"
    }

    async fn handle(&self, signal: &ContentSignal, context: &ChatContext) -> HandlerContribution {
        let ContentSignal::ProfileReferenceable { user_id } = signal else {
            return wrong_signal(self.name(), signal);
        };

        match self.profiles.lookup(user_id).await {
            Some(profile) if !profile.trim().is_empty() => {
                debug!("Found profile for {} in chat {}", user_id, context.chat_id);
                HandlerContribution::contributed(
                    signal,
                    format!("{user_id}: {}", profile.trim()),
                    1.0,
                )
            }
            _ => HandlerContribution::abstain(format!("no profile for {user_id}")),
        }
    }
}
