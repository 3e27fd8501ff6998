//! Linked-article enrichment for short social posts.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("link regex"));

/// Hosts that never carry article content (the platform itself and its shortener).
const PLATFORM_HOSTS: [&str; 3] = ["x.com", "twitter.com", "t.co"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    pub title: String,
    pub text: String,
}

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch_article(&self, url: &str) -> Result<Article>;
}

fn is_platform_host(host: &str) -> bool {
    let host = host.trim_start_matches("www.");
    PLATFORM_HOSTS
        .iter()
        .any(|p| host == *p || host.ends_with(&format!(".{p}")))
}

fn outside_platform(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_end_matches(['.', ',', ';', ':', '!', '?']);
    let url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    (!is_platform_host(&host)).then(|| raw.to_string())
}

/// First http(s) link in `text` pointing outside the social platform.
/// Shortened `t.co` links are skipped; their targets come from [`article_link`].
pub fn external_link(text: &str) -> Option<String> {
    RE_LINK.find_iter(text).find_map(|m| outside_platform(m.as_str()))
}

/// Link to enrich a post with: the first expanded link target outside the
/// platform, else the first outside link written in the text.
pub fn article_link(expanded: &[String], text: &str) -> Option<String> {
    expanded
        .iter()
        .find_map(|l| outside_platform(l))
        .or_else(|| external_link(text))
}

/// Cap article text at `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
