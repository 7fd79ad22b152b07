use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::models::Tone;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub max_messages_per_chat: usize,
    pub default_tone: Tone,
    pub handler_timeout: Duration,
    pub summary_timeout: Duration,
    pub chat_idle_ttl: Duration,
    pub max_links_per_summary: usize,
    pub enable_image_analysis: bool,
    pub profile_user_ids: HashSet<String>,
    pub profile_store_path: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_org_id: Option<String>,
    pub openai_model: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_messages_per_chat: 100,
            default_tone: Tone::Stoic,
            handler_timeout: Duration::from_secs(20),
            summary_timeout: Duration::from_secs(120),
            chat_idle_ttl: Duration::from_secs(3600),
            max_links_per_summary: 8,
            enable_image_analysis: true,
            profile_user_ids: HashSet::new(),
            profile_store_path: None,
            openai_api_key: None,
            openai_org_id: None,
            openai_model: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the environment, falling back to defaults for
    /// anything unset.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable when a value is set but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let default_tone = match env::var("DEFAULT_TONE") {
            Ok(raw) => Tone::from_str(&raw).map_err(|e| format!("DEFAULT_TONE: {e}"))?,
            Err(_) => defaults.default_tone,
        };

        let profile_user_ids = env::var("PROFILE_USER_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            max_messages_per_chat: parse_var("MAX_MESSAGES_PER_CHAT", defaults.max_messages_per_chat)?
                .max(1),
            default_tone,
            handler_timeout: Duration::from_secs(parse_var(
                "HANDLER_TIMEOUT_SECS",
                defaults.handler_timeout.as_secs(),
            )?),
            summary_timeout: Duration::from_secs(parse_var(
                "SUMMARY_TIMEOUT_SECS",
                defaults.summary_timeout.as_secs(),
            )?),
            chat_idle_ttl: Duration::from_secs(parse_var(
                "CHAT_IDLE_TTL_SECS",
                defaults.chat_idle_ttl.as_secs(),
            )?),
            max_links_per_summary: parse_var(
                "MAX_LINKS_PER_SUMMARY",
                defaults.max_links_per_summary,
            )?,
            enable_image_analysis: parse_bool_var(
                "ENABLE_IMAGE_ANALYSIS",
                defaults.enable_image_analysis,
            )?,
            profile_user_ids,
            profile_store_path: env::var("PROFILE_STORE_PATH").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_org_id: env::var("OPENAI_ORG_ID").ok(),
            openai_model: env::var("OPENAI_MODEL").ok(),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| format!("{}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn parse_bool_var(name: &str, default: bool) -> Result<bool, String> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(format!("{}: expected a boolean, got '{}'", name, other)),
        },
        Err(_) => Ok(default),
    }
}
