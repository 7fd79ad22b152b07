use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use super::{ChatContext, Handler, wrong_signal};
use crate::capabilities::{SearchResult, WebSearch};
use crate::core::models::{ContentSignal, HandlerContribution};
use crate::utils::links::is_tweet_url;

const MAX_RESULTS_USED: usize = 3;
const MAX_SNIPPET_CHARS: usize = 280;

/// Looks shared links up through web search and reports what they point at.
pub struct LinkHandler {
    search: Arc<dyn WebSearch>,
}

impl LinkHandler {
    #[must_use]
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Handler for LinkHandler {
    fn name(&self) -> &'static str {
        "link"
    }

    async fn handle(&self, signal: &ContentSignal, context: &ChatContext) -> HandlerContribution {
        let ContentSignal::Link { url } = signal else {
            return wrong_signal(self.name(), signal);
        };

        let results = match self.search.search(url).await {
            Ok(results) => results,
            Err(e) => return HandlerContribution::abstain(format!("search for {url} failed: {e}")),
        };

        let usable: Vec<&SearchResult> = results
            .iter()
            .filter(|r| !r.title.trim().is_empty() || !r.snippet.trim().is_empty())
            .take(MAX_RESULTS_USED)
            .collect();
        if usable.is_empty() {
            return HandlerContribution::abstain(format!("no search results for {url}"));
        }

        let same_host = usable.iter().any(|r| hosts_match(&r.url, url));
        let confidence = if same_host { 0.8 } else { 0.5 };

        let label = if is_tweet_url(url) { "Tweet" } else { "Link" };
        let lines: Vec<String> = usable
            .iter()
            .map(|r| {
                let title = r.title.trim();
                let snippet = truncate_chars(r.snippet.trim(), MAX_SNIPPET_CHARS);
                match (title.is_empty(), snippet.is_empty()) {
                    (false, false) => format!("{title}: {snippet}"),
                    (false, true) => title.to_string(),
                    _ => snippet,
                }
            })
            .collect();

        info!(
            "Link handler found {} results for {} in chat {}",
            lines.len(),
            url,
            context.chat_id
        );
        HandlerContribution::contributed(
            signal,
            format!("{label} {url}: {}", lines.join(" | ")),
            confidence,
        )
    }
}

fn hosts_match(a: &str, b: &str) -> bool {
    let host = |s: &str| {
        Url::parse(s)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase()))
    };
    matches!((host(a), host(b)), (Some(x), Some(y)) if x == y)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{ChatId, Tone};
    use crate::errors::ProviderError;

    struct FixedSearch(Result<Vec<SearchResult>, String>);

    #[async_trait]
    impl WebSearch for FixedSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, ProviderError> {
            self.0.clone().map_err(ProviderError::Http)
        }
    }

    fn context() -> ChatContext {
        ChatContext {
            chat_id: ChatId::from("c1"),
            tone: Tone::Stoic,
            window: Arc::from(Vec::new()),
        }
    }

    fn link(url: &str) -> ContentSignal {
        ContentSignal::Link {
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_tweet_results_are_labelled() {
        let handler = LinkHandler::new(Arc::new(FixedSearch(Ok(vec![SearchResult {
            title: "Someone on X".to_string(),
            snippet: "Big announcement".to_string(),
            url: "https://x.com/someone/status/1".to_string(),
        }]))));
        let out = handler.handle(&link("https://x.com/1"), &context()).await;
        match out {
            HandlerContribution::Contributed(c) => {
                assert_eq!(c.text, "Tweet https://x.com/1: Someone on X: Big announcement");
                assert!((c.confidence - 0.8).abs() < f32::EPSILON);
            }
            other => panic!("expected contribution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_failure_abstains() {
        let handler = LinkHandler::new(Arc::new(FixedSearch(Err("network down".to_string()))));
        let out = handler.handle(&link("https://example.com"), &context()).await;
        assert!(out.is_abstain());
    }

    #[tokio::test]
    async fn test_empty_results_abstain() {
        let handler = LinkHandler::new(Arc::new(FixedSearch(Ok(vec![SearchResult {
            title: " ".to_string(),
            snippet: String::new(),
            url: String::new(),
        }]))));
        let out = handler.handle(&link("https://example.com"), &context()).await;
        assert!(out.is_abstain());
    }

    #[tokio::test]
    async fn test_other_signals_are_refused() {
        let handler = LinkHandler::new(Arc::new(FixedSearch(Ok(Vec::new()))));
        let signal = ContentSignal::ProfileReferenceable {
            user_id: "U1".to_string(),
        };
        assert!(handler.handle(&signal, &context()).await.is_abstain());
    }
}
