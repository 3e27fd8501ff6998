// src/ingest/mod.rs
//! Source collection: stream accounts, stream search, feeds and monitored pages.
//!
//! Sources are visited in a fixed order. A failing source is logged and counted,
//! its cursor stays where it was, and collection continues with the next one.

pub mod feed;
pub mod page;
pub mod providers;
pub mod stream;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;

use crate::config::AppConfig;
use crate::cursor::CursorStore;
use crate::ingest::types::{CandidateItem, FeedClient, PageClient, SourceKind, StreamClient};
use crate::source_trust::SourceTrust;

/// Per-run collection counters. Every rejection lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub fetched: usize,
    pub emitted: usize,
    pub rejected_reach: usize,
    pub rejected_engagement: usize,
    pub limit_reached: usize,
    pub threads_merged: usize,
    pub thread_posts_skipped: usize,
    pub feed_already_seen: usize,
    pub feed_too_old: usize,
    pub feed_undated: usize,
    pub pages_changed: usize,
    pub pages_baseline: usize,
    pub source_errors: usize,
}

/// Normalize text: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Clients the collector depends on. A missing stream client skips stream sources.
#[derive(Clone, Copy)]
pub struct SourceClients<'a> {
    pub stream: Option<&'a dyn StreamClient>,
    pub feeds: &'a dyn FeedClient,
    pub pages: &'a dyn PageClient,
}

pub struct Collector<'a> {
    cfg: &'a AppConfig,
    trust: &'a SourceTrust,
    clients: SourceClients<'a>,
}

impl<'a> Collector<'a> {
    pub fn new(cfg: &'a AppConfig, trust: &'a SourceTrust, clients: SourceClients<'a>) -> Self {
        Self {
            cfg,
            trust,
            clients,
        }
    }

    /// Run every source once. Cursors advance only for sources fetched successfully.
    pub async fn collect(
        &self,
        cursors: &mut CursorStore,
        now: DateTime<Utc>,
    ) -> (Vec<CandidateItem>, CollectStats) {
        let mut stats = CollectStats::default();
        let mut items = Vec::new();

        match self.clients.stream {
            Some(client) => {
                let sc = stream::StreamCollector::new(&self.cfg.stream, self.trust, client);
                items.extend(sc.collect_accounts(cursors, now, &mut stats).await);
                items.extend(sc.collect_searches(cursors, now, &mut stats).await);
            }
            None if !self.cfg.stream.accounts.is_empty() || !self.cfg.stream.searches.is_empty() => {
                tracing::warn!("stream client unavailable, skipping stream sources");
            }
            None => {}
        }

        let fc = feed::FeedCollector::new(
            &self.cfg.feeds,
            &self.cfg.feed_policy,
            &self.cfg.scoring,
            self.cfg.dedup.seen_url_cap,
            self.clients.feeds,
        );
        items.extend(fc.collect(cursors, now, &mut stats).await);

        let pc = page::PageCollector::new(&self.cfg.pages, &self.cfg.scoring, self.clients.pages);
        items.extend(pc.collect(cursors, now, &mut stats).await);

        stats.emitted = items.len();
        for item in &items {
            counter!("curator_items_fetched_total", "source" => item.source.as_str()).increment(1);
        }
        tracing::info!(
            emitted = stats.emitted,
            fetched = stats.fetched,
            rejected_reach = stats.rejected_reach,
            rejected_engagement = stats.rejected_engagement,
            feed_already_seen = stats.feed_already_seen,
            feed_too_old = stats.feed_too_old,
            errors = stats.source_errors,
            "collection finished"
        );
        (items, stats)
    }
}

/// Log and count a failed source. The caller leaves its cursor untouched.
pub(crate) fn record_source_error(
    stats: &mut CollectStats,
    kind: SourceKind,
    source: &str,
    err: &anyhow::Error,
) {
    stats.source_errors += 1;
    counter!("curator_source_errors_total", "source" => kind.as_str()).increment(1);
    tracing::warn!(error = ?err, source = source, kind = kind.as_str(), "source fetch failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_decodes_strips_and_collapses() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b>!</p>\n\n \u{201C}quoted\u{201D} ";
        assert_eq!(normalize_text(s, 1000), "Hello, world ! \"quoted\"");
    }

    #[test]
    fn normalize_text_caps_by_chars() {
        let s = "ああああああ";
        assert_eq!(normalize_text(s, 3), "あああ");
    }
}
