#![allow(clippy::missing_errors_doc)]

//! Local JSON-lines harness around the coordinator.
//!
//! Reads one command per line from stdin and writes one JSON result per line
//! to stdout:
//!
//! ```text
//! {"command":"ingest","message":{"id":"1","chat_id":"c1","sender_id":"U1","timestamp":"2024-05-04T15:30:00Z","text":"hi"}}
//! {"command":"set_tone","chat_id":"c1","tone":"pubbie"}
//! {"command":"summarize","chat_id":"c1","window_size":50}
//! {"command":"reset_thread","chat_id":"c1"}
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use paraphrase::ai::LlmClient;
use paraphrase::capabilities::Capabilities;
use paraphrase::clients::{HttpAttachmentFetcher, StaticProfileStore};
use paraphrase::core::config::AppConfig;
use paraphrase::core::models::{ChatId, Message, SummaryRequest, Tone};
use paraphrase::errors::SummaryError;
use paraphrase::worker::{CANONICAL_FAILURE_MESSAGE, Coordinator};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_MODEL: &str = "gpt-5";
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Command {
    Ingest {
        message: Message,
    },
    SetTone {
        chat_id: ChatId,
        tone: String,
    },
    Summarize {
        chat_id: ChatId,
        #[serde(default)]
        window_size: usize,
        #[serde(default)]
        tone: Option<String>,
    },
    ResetThread {
        chat_id: ChatId,
    },
}

fn build_coordinator(config: &AppConfig) -> anyhow::Result<Coordinator> {
    let api_key = config
        .openai_api_key
        .clone()
        .context("OPENAI_API_KEY must be set")?;
    let model = config
        .openai_model
        .clone()
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let profiles = match &config.profile_store_path {
        Some(path) => StaticProfileStore::from_json_file(path)
            .with_context(|| format!("Failed to load profiles from {path}"))?,
        None => StaticProfileStore::default(),
    };

    let fetcher = Arc::new(HttpAttachmentFetcher::default());
    let llm = Arc::new(LlmClient::new(
        api_key,
        config.openai_org_id.clone(),
        model,
    ));
    let capabilities = Capabilities {
        web_search: llm.clone(),
        vision: llm.clone(),
        profiles: Arc::new(profiles),
        attachments: fetcher,
    };
    Ok(Coordinator::new(config, llm, &capabilities))
}

fn parse_tone(raw: &str) -> Result<Tone, Value> {
    raw.parse::<Tone>()
        .map_err(|e| json!({ "ok": false, "error": e }))
}

async fn execute(coordinator: &Coordinator, command: Command) -> Value {
    match command {
        Command::Ingest { message } => {
            let chat_id = message.chat_id.clone();
            coordinator.ingest(message).await;
            json!({
                "ok": true,
                "chat_id": chat_id,
                "history_len": coordinator.history_len(&chat_id).await
            })
        }
        Command::SetTone { chat_id, tone } => match parse_tone(&tone) {
            Ok(tone) => {
                coordinator.set_tone(&chat_id, tone).await;
                json!({ "ok": true, "chat_id": chat_id, "tone": tone })
            }
            Err(e) => e,
        },
        Command::Summarize {
            chat_id,
            window_size,
            tone,
        } => {
            let tone_override = match tone.as_deref().map(parse_tone).transpose() {
                Ok(t) => t,
                Err(e) => return e,
            };
            let request = SummaryRequest {
                chat_id,
                window_size,
                tone_override,
            };
            match coordinator.summarize(&request).await {
                Ok(result) => json!({
                    "ok": true,
                    "chat_id": request.chat_id,
                    "summary": result.text,
                    "contributing_signals": result.contributing_signals
                }),
                Err(e @ SummaryError::UnknownChat(_)) => {
                    json!({ "ok": false, "error": e.to_string() })
                }
                Err(e) => {
                    error!("Failed to generate summary: {}", e);
                    json!({ "ok": false, "error": CANONICAL_FAILURE_MESSAGE })
                }
            }
        }
        Command::ResetThread { chat_id } => {
            coordinator.reset_thread(&chat_id);
            json!({ "ok": true, "chat_id": chat_id })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    paraphrase::setup_logging();

    let config = AppConfig::from_env().map_err(anyhow::Error::msg)?;
    let coordinator = Arc::new(build_coordinator(&config)?);

    let shutdown = CancellationToken::new();
    let sweeper = Arc::clone(&coordinator).spawn_idle_sweeper(SWEEP_INTERVAL, shutdown.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Command>(&line) {
            Ok(command) => execute(&coordinator, command).await,
            Err(e) => {
                warn!("Rejected malformed command: {}", e);
                json!({ "ok": false, "error": format!("Malformed command: {e}") })
            }
        };
        stdout.write_all(reply.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("Input closed; shutting down");
    shutdown.cancel();
    sweeper.await.context("Idle sweeper task failed")?;
    Ok(())
}
