//! LLM (`OpenAI`) API client module
//!
//! One client backs three capabilities: text completion for the base summary,
//! hosted web search for the link and topic handlers, and image description
//! for the image handler. All of them go through the Responses API.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use openai_api_rs::v1::chat_completion::{
    ChatCompletionMessage, Content, ContentType, ImageUrl, ImageUrlType, MessageRole,
};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::capabilities::{
    CompletionPrompt, ImageDescribe, MAX_IMAGE_BYTES, SearchResult, TextCompletion, WebSearch,
};
use crate::core::thread::{ThreadContext, ThreadTurn};
use crate::errors::ProviderError;
use crate::utils::mime::is_supported_image_mime;

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const MAX_CONTEXT_TOKENS: usize = 400_000;
const MAX_OUTPUT_TOKENS: usize = 100_000;
const MIN_OUTPUT_TOKENS: usize = 500;
const TOKEN_BUFFER: usize = 250;
const SEARCH_OUTPUT_TOKENS: usize = 2_000;
const DESCRIBE_OUTPUT_TOKENS: usize = 1_000;

const DESCRIBE_INSTRUCTION: &str = "Describe what this image shows in one or two plain sentences, \
    for someone catching up on a group chat. Mention any visible text.";

#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4 + 1
}

/// `OpenAI`-backed implementation of the completion, search and vision
/// capabilities.
pub struct LlmClient {
    api_key: String,
    org_id: Option<String>,
    model_name: String,
}

impl LlmClient {
    #[must_use]
    pub fn new(api_key: String, org_id: Option<String>, model_name: String) -> Self {
        Self {
            api_key,
            org_id,
            model_name,
        }
    }

    /// Chat-style prompt: instructions, prior thread turns replayed as
    /// user/assistant pairs, then this turn's input.
    ///
    /// Only the newest turns that still leave room for a reply are replayed.
    #[must_use]
    pub fn build_prompt(
        &self,
        prompt: &CompletionPrompt,
        context: &ThreadContext,
    ) -> Vec<ChatCompletionMessage> {
        let turns = replayable_turns(prompt, &context.turns);
        if turns.len() < context.turns.len() {
            warn!(
                "Dropping {} of {} thread turns on {} to fit the context window",
                context.turns.len() - turns.len(),
                context.turns.len(),
                context.handle
            );
        }

        let mut chat = Vec::with_capacity(turns.len() * 2 + 2);
        chat.push(text_message(MessageRole::system, &prompt.instructions));
        for turn in turns {
            chat.push(text_message(MessageRole::user, &turn.request));
            chat.push(text_message(MessageRole::assistant, &turn.reply));
        }
        chat.push(text_message(MessageRole::user, &prompt.input));
        chat
    }

    async fn post_responses(&self, body: &Value) -> Result<Value, ProviderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to build OpenAI HTTP client: {e}")))?;

        let mut headers = reqwest::header::HeaderMap::new();
        let auth_value = format!("Bearer {}", self.api_key)
            .parse()
            .map_err(|e| ProviderError::Http(format!("Invalid Authorization header: {e}")))?;
        headers.insert("Authorization", auth_value);

        let content_type_value = "application/json"
            .parse()
            .map_err(|e| ProviderError::Http(format!("Invalid Content-Type header: {e}")))?;
        headers.insert("Content-Type", content_type_value);

        if let Some(org) = &self.org_id {
            let org_value = org.parse().map_err(|e| {
                ProviderError::Http(format!("Invalid OpenAI-Organization header: {e}"))
            })?;
            headers.insert("OpenAI-Organization", org_value);
        }

        let response = client
            .post(RESPONSES_URL)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|e| {
                format!("Failed to read error response body (status {status}): {e}")
            });
            return Err(ProviderError::OpenAI(format!(
                "OpenAI API error (status {status}): {error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse OpenAI response: {e}")))
    }
}

#[async_trait]
impl TextCompletion for LlmClient {
    async fn complete(
        &self,
        prompt: &CompletionPrompt,
        context: &ThreadContext,
    ) -> Result<String, ProviderError> {
        let chat = self.build_prompt(prompt, context);

        #[cfg(feature = "debug-logs")]
        info!("Using completion prompt:\n{:?}", chat);

        #[cfg(not(feature = "debug-logs"))]
        info!(
            "Requesting completion on {} with {} prior turns",
            context.handle,
            context.turns.len()
        );

        let max_output_tokens = output_budget(&chat)?;
        let request_body = json!({
            "model": self.model_name,
            "input": build_responses_input_from_prompt(&chat),
            "max_output_tokens": max_output_tokens
        });

        let response_json = self.post_responses(&request_body).await?;
        extract_output_text(&response_json)
            .ok_or_else(|| ProviderError::Malformed("No text in response".to_string()))
    }
}

#[async_trait]
impl WebSearch for LlmClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ProviderError> {
        debug!("Web search: {}", query);
        let request_body = json!({
            "model": self.model_name,
            "tools": [{ "type": "web_search" }],
            "input": format!(
                "Search the web for: {query}\nReply with one short factual sentence per relevant result, citing each source."
            ),
            "max_output_tokens": SEARCH_OUTPUT_TOKENS
        });

        let response_json = self.post_responses(&request_body).await?;
        if response_json.get("output").is_none() && response_json.get("output_text").is_none() {
            return Err(ProviderError::Malformed(
                "Search response carried no output".to_string(),
            ));
        }
        let results = parse_url_citations(&response_json);
        info!("Web search returned {} cited results", results.len());
        Ok(results)
    }
}

#[async_trait]
impl ImageDescribe for LlmClient {
    async fn describe(
        &self,
        attachment_ref: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<String, ProviderError> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ProviderError::Malformed(format!(
                "image {attachment_ref} is {} bytes, above the {MAX_IMAGE_BYTES} byte limit",
                bytes.len()
            )));
        }
        if !is_supported_image_mime(mime) {
            return Err(ProviderError::Malformed(format!(
                "{attachment_ref} has unsupported type {mime}"
            )));
        }
        let url = format!("data:{mime};base64,{}", BASE64.encode(bytes));
        let chat = vec![
            text_message(MessageRole::user, DESCRIBE_INSTRUCTION),
            ChatCompletionMessage {
                role: MessageRole::user,
                content: Content::ImageUrl(vec![ImageUrl {
                    r#type: ContentType::image_url,
                    text: None,
                    image_url: Some(ImageUrlType { url }),
                }]),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            },
        ];

        let request_body = json!({
            "model": self.model_name,
            "input": build_responses_input_from_prompt(&chat),
            "max_output_tokens": DESCRIBE_OUTPUT_TOKENS
        });

        let response_json = self.post_responses(&request_body).await?;
        match extract_output_text(&response_json) {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => {
                warn!("Vision response for {} carried no text", attachment_ref);
                Err(ProviderError::Malformed(
                    "No description in response".to_string(),
                ))
            }
        }
    }
}

fn text_message(role: MessageRole, text: &str) -> ChatCompletionMessage {
    ChatCompletionMessage {
        role,
        content: Content::Text(text.to_string()),
        name: None,
        tool_calls: None,
        tool_call_id: None,
    }
}

fn turn_tokens(turn: &ThreadTurn) -> usize {
    estimate_tokens(&turn.request) + estimate_tokens(&turn.reply)
}

/// The newest suffix of `turns` that fits alongside `prompt` while leaving at
/// least `MIN_OUTPUT_TOKENS` for the reply.
fn replayable_turns<'a>(prompt: &CompletionPrompt, turns: &'a [ThreadTurn]) -> &'a [ThreadTurn] {
    let reserved = estimate_tokens(&prompt.instructions)
        + estimate_tokens(&prompt.input)
        + TOKEN_BUFFER
        + MIN_OUTPUT_TOKENS;
    let mut room = MAX_CONTEXT_TOKENS.saturating_sub(reserved);
    let mut keep = 0;
    for turn in turns.iter().rev() {
        let cost = turn_tokens(turn);
        if cost > room {
            break;
        }
        room -= cost;
        keep += 1;
    }
    &turns[turns.len() - keep..]
}

/// Output token budget left after the prompt, or an error when the prompt
/// alone does not leave room for a useful reply.
fn output_budget(prompt: &[ChatCompletionMessage]) -> Result<usize, ProviderError> {
    let estimated_input_tokens = prompt
        .iter()
        .map(|msg| match &msg.content {
            Content::Text(t) => estimate_tokens(t),
            Content::ImageUrl(_) => 1_000,
        })
        .sum::<usize>();
    debug!("Estimated input tokens: {}", estimated_input_tokens);

    // Saturating math so an oversized prompt cannot underflow.
    let max_output_tokens = MAX_CONTEXT_TOKENS
        .saturating_sub(estimated_input_tokens)
        .saturating_sub(TOKEN_BUFFER)
        .min(MAX_OUTPUT_TOKENS);

    if max_output_tokens < MIN_OUTPUT_TOKENS {
        return Err(ProviderError::Malformed(format!(
            "Prompt of ~{estimated_input_tokens} tokens does not fit the model context window"
        )));
    }
    Ok(max_output_tokens)
}

/// Build Responses API input payload from a chat-style prompt.
/// - Assistant turns become `output_text` parts so replayed history reads as
///   the model's own replies
/// - Everything else emits `input_text` and `input_image` parts
pub(crate) fn build_responses_input_from_prompt(prompt: &[ChatCompletionMessage]) -> Vec<Value> {
    prompt
        .iter()
        .map(|m| {
            let (role_str, text_type) = match m.role {
                MessageRole::system => ("system", "input_text"),
                MessageRole::assistant => ("assistant", "output_text"),
                MessageRole::user | MessageRole::function | MessageRole::tool => {
                    ("user", "input_text")
                }
            };

            let mut parts: Vec<Value> = Vec::new();
            match &m.content {
                Content::Text(t) => {
                    parts.push(json!({
                        "type": text_type,
                        "text": t
                    }));
                }
                Content::ImageUrl(imgs) => {
                    for img in imgs {
                        if let Some(ref iu) = img.image_url {
                            parts.push(json!({
                                "type": "input_image",
                                "image_url": iu.url
                            }));
                        }
                    }
                }
            }

            json!({
                "role": role_str,
                "content": parts
            })
        })
        .collect()
}

fn output_text_parts(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("output_text"))
}

fn part_text(part: &Value) -> Option<&str> {
    part.get("text").and_then(|t| {
        t.as_str()
            .or_else(|| t.get("value").and_then(Value::as_str))
    })
}

/// Text of a Responses API reply: `output_text` when present, otherwise the
/// `output_text` parts of every output item joined by newlines.
#[must_use]
pub(crate) fn extract_output_text(response: &Value) -> Option<String> {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    let collected: Vec<&str> = output_text_parts(response).filter_map(part_text).collect();
    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n"))
    }
}

/// Turn `url_citation` annotations into search results, one per distinct
/// URL in citation order. The snippet is the sentence the citation closes.
#[must_use]
pub(crate) fn parse_url_citations(response: &Value) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = Vec::new();
    for part in output_text_parts(response) {
        let text = part_text(part).unwrap_or_default();
        let Some(annotations) = part.get("annotations").and_then(Value::as_array) else {
            continue;
        };
        for annotation in annotations {
            if annotation.get("type").and_then(Value::as_str) != Some("url_citation") {
                continue;
            }
            let Some(url) = annotation.get("url").and_then(Value::as_str) else {
                continue;
            };
            if results.iter().any(|r| r.url == url) {
                continue;
            }
            let title = annotation
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let start = annotation
                .get("start_index")
                .and_then(Value::as_u64)
                .and_then(|i| usize::try_from(i).ok())
                .unwrap_or(0);
            let snippet = sentence_before(text, start);
            results.push(SearchResult {
                snippet: if snippet.is_empty() {
                    title.clone()
                } else {
                    snippet
                },
                title,
                url: url.to_string(),
            });
        }
    }
    results
}

fn sentence_before(text: &str, char_index: usize) -> String {
    let prefix: String = text.chars().take(char_index).collect();
    let trimmed = prefix.trim_end();
    let body = trimmed.strip_suffix('.').unwrap_or(trimmed);
    let begin = body.rfind(['\n', '.', ')']).map_or(0, |i| i + 1);
    trimmed[begin..].trim().to_string()
}
