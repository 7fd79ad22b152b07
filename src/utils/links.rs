use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static RAW_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>()\[\]{}"']+"#)
        .unwrap_or_else(|_| Regex::new(r"$^").expect("fallback regex compiles"))
});

const TWEET_HOSTS: &[&str] = &["twitter.com", "x.com", "t.co"];

/// Extract HTTP(S) links from message text in order of appearance.
///
/// Markdown links (`[label](https://example.com)`) are covered because the
/// URL pattern stops at brackets and parentheses.
#[must_use]
pub fn extract_links_from_text(text: &str) -> Vec<String> {
    RAW_URL_RE
        .find_iter(text)
        .map(|m| trim_trailing_punctuation(m.as_str()).to_string())
        .collect()
}

/// Normalize and dedupe, keeping the first occurrence of each link.
#[must_use]
pub fn normalize_and_dedupe_links<I>(raw_links: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();

    for raw in raw_links {
        let trimmed = trim_trailing_punctuation(raw.trim());
        if let Some(norm) = normalize_link(trimmed)
            && seen.insert(norm.clone())
        {
            out.push(norm);
        }
    }

    out
}

#[must_use]
fn normalize_link(raw: &str) -> Option<String> {
    let raw = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '<' | '>' | '"' | '\''));
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return None;
    }

    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);

    // Links to other chat messages are references, not content worth looking up.
    if let Some(host) = url.host_str().map(str::to_ascii_lowercase) {
        let is_chat_permalink = host == "t.me" && url.path().starts_with("/c/");
        if is_chat_permalink {
            return None;
        }
    }

    let rendered = url.to_string();
    let rendered = rendered.trim_end_matches('/').to_string();

    Some(rendered)
}

/// Whether a normalized link points at a tweet.
#[must_use]
pub fn is_tweet_url(link: &str) -> bool {
    Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| {
            let host = host.strip_prefix("www.").unwrap_or(&host);
            TWEET_HOSTS.contains(&host)
        })
}

#[must_use]
fn trim_trailing_punctuation(s: &str) -> &str {
    s.trim_end_matches(&['.', ',', ';', ':', '!', '?', ')', ']', '}'][..])
}
