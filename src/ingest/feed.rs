// src/ingest/feed.rs
//! RSS/Atom feed sources.
//!
//! New content is the set difference between this cycle's article URLs and the
//! full set stored last cycle; timestamps are only used for the age cutoff.
//! Must-include feeds skip the difference and the cutoff and admit everything
//! published since local midnight at the reserved maximal score.

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use std::collections::HashSet;

use crate::analyze::scoring::{feed_raw_score, MUST_INCLUDE_SCORE};
use crate::config::{FeedConfig, FeedPolicyConfig, ScoringConfig};
use crate::cursor::CursorStore;
use crate::ingest::types::{CandidateItem, Category, FeedClient, FeedEntry, ItemDetail, SourceKind};
use crate::ingest::{normalize_text, record_source_error, CollectStats};

const TITLE_MAX_CHARS: usize = 300;
const SUMMARY_MAX_CHARS: usize = 1_000;

pub struct FeedCollector<'a> {
    feeds: &'a [FeedConfig],
    policy: &'a FeedPolicyConfig,
    scoring: &'a ScoringConfig,
    seen_cap: usize,
    client: &'a dyn FeedClient,
}

/// Start of the current local day, expressed in UTC.
pub fn local_midnight(now: DateTime<Utc>, utc_offset_hours: i32) -> DateTime<Utc> {
    let offset = FixedOffset::east_opt(utc_offset_hours.saturating_mul(3600))
        .unwrap_or_else(|| Utc.fix());
    let local = now.with_timezone(&offset);
    local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|m| m.and_local_timezone(offset).single())
        .map(|m| m.with_timezone(&Utc))
        .unwrap_or(now)
}

impl<'a> FeedCollector<'a> {
    pub fn new(
        feeds: &'a [FeedConfig],
        policy: &'a FeedPolicyConfig,
        scoring: &'a ScoringConfig,
        seen_cap: usize,
        client: &'a dyn FeedClient,
    ) -> Self {
        Self {
            feeds,
            policy,
            scoring,
            seen_cap,
            client,
        }
    }

    pub async fn collect(
        &self,
        cursors: &mut CursorStore,
        now: DateTime<Utc>,
        stats: &mut CollectStats,
    ) -> Vec<CandidateItem> {
        let mut out = Vec::new();
        for feed in self.feeds {
            let kind = if feed.must_include {
                SourceKind::MustIncludeFeed
            } else {
                SourceKind::Feed
            };
            let entries = match self.client.fetch_feed(&feed.url).await {
                Ok(e) => e,
                Err(e) => {
                    record_source_error(stats, kind, &feed.name, &e);
                    continue;
                }
            };
            stats.fetched += entries.len();

            let current: Vec<String> = entries
                .iter()
                .map(|e| e.link.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();

            let before = out.len();
            if feed.must_include {
                self.admit_must_include(feed, &entries, now, stats, &mut out);
            } else {
                let seen: HashSet<String> = cursors
                    .feed_seen_urls(&feed.url)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                self.admit_new(feed, &entries, &seen, now, stats, &mut out);
            }
            tracing::info!(
                feed = %feed.name,
                entries = entries.len(),
                new = out.len() - before,
                "feed checked"
            );

            cursors.set_feed_seen_urls(&feed.url, &current, self.seen_cap, now);
        }
        out
    }

    fn admit_new(
        &self,
        feed: &FeedConfig,
        entries: &[FeedEntry],
        seen: &HashSet<String>,
        now: DateTime<Utc>,
        stats: &mut CollectStats,
        out: &mut Vec<CandidateItem>,
    ) {
        let cutoff = now - Duration::hours(self.policy.cutoff_hours);
        for entry in entries {
            let link = entry.link.trim();
            if link.is_empty() {
                continue;
            }
            if seen.contains(link) {
                stats.feed_already_seen += 1;
                continue;
            }
            let Some(published_at) = entry.published_at else {
                stats.feed_undated += 1;
                tracing::debug!(feed = %feed.name, url = link, "undated entry skipped");
                continue;
            };
            if published_at < cutoff {
                stats.feed_too_old += 1;
                tracing::debug!(feed = %feed.name, url = link, %published_at, "entry older than cutoff");
                continue;
            }
            let raw = feed_raw_score(self.scoring.feed_base_score, feed.priority_bonus);
            out.push(self.item(feed, entry, SourceKind::Feed, published_at, raw));
        }
    }

    fn admit_must_include(
        &self,
        feed: &FeedConfig,
        entries: &[FeedEntry],
        now: DateTime<Utc>,
        stats: &mut CollectStats,
        out: &mut Vec<CandidateItem>,
    ) {
        let midnight = local_midnight(now, self.policy.local_utc_offset_hours);
        for entry in entries {
            if entry.link.trim().is_empty() {
                continue;
            }
            let Some(published_at) = entry.published_at else {
                stats.feed_undated += 1;
                continue;
            };
            if published_at < midnight {
                stats.feed_too_old += 1;
                continue;
            }
            out.push(self.item(feed, entry, SourceKind::MustIncludeFeed, published_at, MUST_INCLUDE_SCORE));
        }
    }

    fn item(
        &self,
        feed: &FeedConfig,
        entry: &FeedEntry,
        kind: SourceKind,
        published_at: DateTime<Utc>,
        raw: i64,
    ) -> CandidateItem {
        CandidateItem {
            source: kind,
            title: normalize_text(&entry.title, TITLE_MAX_CHARS),
            canonical_url: entry.link.trim().to_string(),
            published_at,
            raw_score: raw,
            score: raw,
            category: Category::Unknown,
            detail: ItemDetail::Feed {
                feed_url: feed.url.clone(),
                feed_name: feed.name.clone(),
                summary: normalize_text(&entry.summary, SUMMARY_MAX_CHARS),
                official: feed.official,
            },
        }
    }
}
