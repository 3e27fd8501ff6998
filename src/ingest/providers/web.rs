// src/ingest/providers/web.rs
//! Plain HTTP page fetching: monitored pages and linked articles.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use super::http_client;
use crate::compose::article::{Article, ArticleFetcher};
use crate::ingest::types::PageClient;

static RE_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "nav", "header", "footer", "noscript"]
        .iter()
        .map(|t| Regex::new(&format!(r"(?is)<{t}\b[^>]*>.*?</{t}\s*>")).expect("block regex"))
        .collect()
});
static RE_COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex"));
static RE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("title regex"));
static RE_BREAKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(?:br|/p|/div|/li|/h[1-6]|/tr|/section|/article)\b[^>]*>").expect("break regex")
});
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").expect("space regex"));

/// Document `<title>`, if any.
pub fn html_title(html: &str) -> Option<String> {
    RE_TITLE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| html_escape::decode_html_entities(m.as_str().trim()).to_string())
        .filter(|t| !t.is_empty())
}

/// Visible text of a page: boilerplate blocks and tags removed, one line per block.
pub fn html_to_text(html: &str) -> String {
    let mut s = RE_COMMENTS.replace_all(html, " ").into_owned();
    for re in RE_BLOCKS.iter() {
        s = re.replace_all(&s, " ").into_owned();
    }
    s = RE_TITLE.replace_all(&s, " ").into_owned();
    s = RE_BREAKS.replace_all(&s, "\n").into_owned();
    s = RE_TAGS.replace_all(&s, " ").into_owned();
    let decoded = html_escape::decode_html_entities(&s).into_owned();
    decoded
        .lines()
        .map(|l| RE_SPACES.replace_all(l, " ").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

async fn get_text(http: &reqwest::Client, url: &str) -> Result<String> {
    http.get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("page {url}"))?
        .text()
        .await
        .context("reading page body")
}

pub struct HttpPageClient {
    http: reqwest::Client,
}

impl HttpPageClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(20))?,
        })
    }
}

#[async_trait]
impl PageClient for HttpPageClient {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        get_text(&self.http, url).await
    }
}

pub struct HttpArticleFetcher {
    http: reqwest::Client,
}

impl HttpArticleFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(30))?,
        })
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch_article(&self, url: &str) -> Result<Article> {
        let html = get_text(&self.http, url).await?;
        Ok(Article {
            title: html_title(&html).unwrap_or_default(),
            text: html_to_text(&html),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Acme &amp; Co | Changelog</title>
<style>body { color: red }</style><script>var x = "<p>not text</p>";</script></head>
<body><header><a href="/">Home</a></header><nav><ul><li>Docs</li></ul></nav>
<!-- build 123 -->
<article><h1>Release 2.1</h1><p>Adds   streaming&nbsp;support.</p><p>Fixes <b>bugs</b>.</p></article>
<footer>&copy; Acme</footer></body></html>"#;

    #[test]
    fn strips_boilerplate_and_tags() {
        let text = html_to_text(PAGE);
        assert_eq!(text, "Release 2.1\nAdds streaming support.\nFixes bugs .");
    }

    #[test]
    fn extracts_title() {
        assert_eq!(html_title(PAGE).as_deref(), Some("Acme & Co | Changelog"));
        assert_eq!(html_title("<p>none</p>"), None);
    }
}
