use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{ChatContext, Handler, wrong_signal};
use crate::capabilities::WebSearch;
use crate::classifier::SPORTS_DOMAIN;
use crate::core::models::{ContentSignal, HandlerContribution, Message};
use crate::utils::sports;

const MAX_RESULTS_USED: usize = 2;
const MAX_QUERY_ENTITIES: usize = 4;

/// Finds match context for football chatter.
pub struct TopicHandler {
    search: Arc<dyn WebSearch>,
}

impl TopicHandler {
    #[must_use]
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Handler for TopicHandler {
    fn name(&self) -> &'static str {
        "topic"
    }

    async fn handle(&self, signal: &ContentSignal, context: &ChatContext) -> HandlerContribution {
        let ContentSignal::TopicReference { domain, confidence } = signal else {
            return wrong_signal(self.name(), signal);
        };
        if domain != SPORTS_DOMAIN {
            return HandlerContribution::abstain(format!("no lookup for topic domain {domain}"));
        }

        let query = build_match_query(&context.window);
        let results = match self.search.search(&query).await {
            Ok(results) => results,
            Err(e) => return HandlerContribution::abstain(format!("match search failed: {e}")),
        };

        let lines: Vec<String> = results
            .iter()
            .filter(|r| !r.snippet.trim().is_empty())
            .take(MAX_RESULTS_USED)
            .map(|r| {
                if r.title.trim().is_empty() {
                    r.snippet.trim().to_string()
                } else {
                    format!("{}: {}", r.title.trim(), r.snippet.trim())
                }
            })
            .collect();

        info!(
            "Topic handler found {} results for '{}' in chat {}",
            lines.len(),
            query,
            context.chat_id
        );

        if lines.is_empty() {
            return HandlerContribution::contributed(signal, "Match context: none found", 0.0);
        }
        HandlerContribution::contributed(
            signal,
            format!("Match context: {}", lines.join(" | ")),
            *confidence,
        )
    }
}

/// Build a search query from the teams, players and score lines in the window.
#[must_use]
pub fn build_match_query(window: &[Message]) -> String {
    let mut entities: Vec<&'static str> = Vec::new();
    let mut scores: Vec<String> = Vec::new();
    for msg in window {
        for name in sports::recognised_entities(&msg.text) {
            if !entities.contains(&name) {
                entities.push(name);
            }
        }
        for score in sports::score_lines(&msg.text) {
            if !scores.contains(&score) {
                scores.push(score);
            }
        }
    }

    if entities.is_empty() {
        return "football match results today".to_string();
    }

    entities.truncate(MAX_QUERY_ENTITIES);
    let mut query = entities.join(" ");
    if let Some(score) = scores.first() {
        query.push(' ');
        query.push_str(score);
    }
    query.push_str(" latest match");
    query
}
