// src/ingest/providers/rss.rs
//! RSS 2.0 and Atom parsing over `quick-xml`'s serde support.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use super::http_client;
use crate::ingest::types::{FeedClient, FeedEntry};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

/// RFC 2822 (RSS) first, then RFC 3339 (Atom). Unparsable dates yield `None`.
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = OffsetDateTime::parse(ts, &Rfc2822) {
        return DateTime::from_timestamp(dt.unix_timestamp(), 0);
    }
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

fn looks_like_atom(xml: &str) -> bool {
    match (xml.find("<feed"), xml.find("<rss")) {
        (Some(f), Some(r)) => f < r,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Parse an RSS or Atom document into entries in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let t0 = std::time::Instant::now();
    let clean = scrub_html_entities_for_xml(xml);
    let entries = if looks_like_atom(&clean) {
        let feed: AtomFeed = from_str(&clean).context("parsing atom xml")?;
        feed.entry.into_iter().map(atom_entry).collect()
    } else {
        let rss: Rss = from_str(&clean).context("parsing rss xml")?;
        rss.channel.item.into_iter().map(rss_item).collect()
    };
    histogram!("curator_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(entries)
}

fn rss_item(it: Item) -> FeedEntry {
    let link = it
        .link
        .filter(|l| !l.trim().is_empty())
        .or_else(|| it.guid.filter(|g| g.starts_with("http")))
        .unwrap_or_default();
    FeedEntry {
        title: it.title.unwrap_or_default(),
        link: link.trim().to_string(),
        published_at: it.pub_date.as_deref().and_then(parse_feed_date),
        summary: it.description.unwrap_or_default(),
    }
}

fn atom_entry(e: AtomEntry) -> FeedEntry {
    let link = e
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
        .or_else(|| e.links.first())
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default();
    let published_at = e
        .published
        .as_deref()
        .or(e.updated.as_deref())
        .and_then(parse_feed_date);
    FeedEntry {
        title: e.title.map(|t| t.value).unwrap_or_default(),
        link,
        published_at,
        summary: e.summary.or(e.content).map(|t| t.value).unwrap_or_default(),
    }
}

pub struct HttpFeedClient {
    http: reqwest::Client,
}

impl HttpFeedClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(20))?,
        })
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let body = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("feed {url}"))?
            .text()
            .await
            .context("reading feed body")?;
        parse_feed(&body).with_context(|| format!("feed {url}"))
    }
}
