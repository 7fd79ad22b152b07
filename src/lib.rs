//! Para-Phrase - a group-chat summarization core.
//!
//! Messages are ingested per chat, and a summary request runs the trailing
//! window through a content classifier, fans the detected signals out to
//! specialized handlers (links, images, sports chatter, participant
//! profiles), asks a completion model for the base summary in the chat's
//! tone, and merges everything into one text.
//!
//! # Architecture
//!
//! - `core`: chat state, conversation threads, configuration and models
//! - `classifier` and `handlers`: signal detection and per-signal enrichment
//! - `worker`: the coordinator that drives a request end to end
//! - `ai` and `clients`: `OpenAI`, HTTP and profile-store capability backends
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use paraphrase::ai::LlmClient;
//! use paraphrase::capabilities::Capabilities;
//! use paraphrase::clients::{HttpAttachmentFetcher, StaticProfileStore};
//! use paraphrase::core::config::AppConfig;
//! use paraphrase::core::models::{ChatId, SummaryRequest};
//! use paraphrase::worker::Coordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     paraphrase::setup_logging();
//!
//!     let config = AppConfig::default();
//!     let fetcher = Arc::new(HttpAttachmentFetcher::default());
//!     let llm = Arc::new(LlmClient::new(
//!         "sk-dummy".to_string(),
//!         None,
//!         "gpt-5".to_string(),
//!     ));
//!     let capabilities = Capabilities {
//!         web_search: llm.clone(),
//!         vision: llm.clone(),
//!         profiles: Arc::new(StaticProfileStore::default()),
//!         attachments: fetcher,
//!     };
//!     let coordinator = Coordinator::new(&config, llm, &capabilities);
//!
//!     let result = coordinator
//!         .summarize(&SummaryRequest {
//!             chat_id: ChatId::from("chat-1"),
//!             window_size: 50,
//!             tone_override: None,
//!         })
//!         .await?;
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod ai;
pub mod capabilities;
pub mod classifier;
pub mod clients;
pub mod composer;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod prompt;
pub mod utils;
pub mod worker;

pub use ai::estimate_tokens;

/// Configure structured JSON logging, filtered by `RUST_LOG` (default
/// `info`).
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
///
/// # Example
///
/// ```
/// paraphrase::setup_logging();
/// paraphrase::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
