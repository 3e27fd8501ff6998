// src/ingest/stream.rs
//! Stream sources (account timelines and keyword search).
//!
//! With a stored last-seen id only strictly newer posts are requested; without one
//! the fetch falls back to a fixed cold-start window. Posts are examined oldest
//! first and the cursor advances to the newest *examined* id, so a post cut off by
//! the per-kind limit is fetched again next cycle.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use std::collections::HashSet;

use crate::analyze::scoring::engagement_score;
use crate::config::StreamConfig;
use crate::cursor::{compare_ids, CursorStore};
use crate::ingest::types::{
    CandidateItem, Category, FetchWindow, ItemDetail, SourceKind, StreamClient, StreamPost,
    ThreadPost,
};
use crate::ingest::{normalize_text, record_source_error, CollectStats};
use crate::source_trust::{normalize, SourceTrust};

const TITLE_MAX_CHARS: usize = 120;

#[derive(Debug, Default)]
struct BatchOutcome {
    /// Newest id examined; the cursor moves here.
    newest: Option<String>,
    /// The per-kind limit stopped the batch.
    limit_hit: bool,
}

pub struct StreamCollector<'a> {
    cfg: &'a StreamConfig,
    trust: &'a SourceTrust,
    client: &'a dyn StreamClient,
    thread_authors: HashSet<String>,
}

impl<'a> StreamCollector<'a> {
    pub fn new(cfg: &'a StreamConfig, trust: &'a SourceTrust, client: &'a dyn StreamClient) -> Self {
        let thread_authors = cfg.thread_authors.iter().map(|h| normalize(h)).collect();
        Self {
            cfg,
            trust,
            client,
            thread_authors,
        }
    }

    fn window(&self, since_id: Option<&str>, now: DateTime<Utc>) -> FetchWindow {
        match since_id {
            Some(id) => FetchWindow::SinceId(id.to_string()),
            None => FetchWindow::StartTime(now - Duration::hours(self.cfg.cold_start_hours)),
        }
    }

    pub async fn collect_accounts(
        &self,
        cursors: &mut CursorStore,
        now: DateTime<Utc>,
        stats: &mut CollectStats,
    ) -> Vec<CandidateItem> {
        let mut out = Vec::new();
        let limit = self.cfg.limit_accounts;
        for handle in &self.cfg.accounts {
            if out.len() >= limit {
                stats.limit_reached += 1;
                tracing::info!(limit, kind = "stream_account", "per-cycle stream limit reached");
                break;
            }

            let cached = cursors.account_user_id(handle).map(str::to_string);
            let user_id = match cached {
                Some(id) => id,
                None => match self.client.resolve_account(handle).await {
                    Ok(id) => {
                        cursors.set_account_user_id(handle, &id);
                        id
                    }
                    Err(e) => {
                        record_source_error(stats, SourceKind::StreamAccount, handle, &e);
                        continue;
                    }
                },
            };

            let window = self.window(cursors.account_since_id(handle), now);
            let posts = match self
                .client
                .account_posts(&user_id, &window, self.cfg.max_results_per_source)
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    record_source_error(stats, SourceKind::StreamAccount, handle, &e);
                    continue;
                }
            };

            let batch = self
                .process_batch(posts, SourceKind::StreamAccount, None, limit, &mut out, cursors, now, stats)
                .await;
            if let Some(id) = &batch.newest {
                cursors.set_account_since_id(handle, id);
            }
            if batch.limit_hit {
                break;
            }
        }
        out
    }

    pub async fn collect_searches(
        &self,
        cursors: &mut CursorStore,
        now: DateTime<Utc>,
        stats: &mut CollectStats,
    ) -> Vec<CandidateItem> {
        let mut out = Vec::new();
        let limit = self.cfg.limit_search;
        for query in &self.cfg.searches {
            if out.len() >= limit {
                stats.limit_reached += 1;
                tracing::info!(limit, kind = "stream_search", "per-cycle stream limit reached");
                break;
            }
            let window = self.window(cursors.search_since_id(query), now);
            let posts = match self
                .client
                .search_posts(query, &window, self.cfg.max_results_per_source)
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    record_source_error(stats, SourceKind::StreamSearch, query, &e);
                    continue;
                }
            };
            let batch = self
                .process_batch(posts, SourceKind::StreamSearch, Some(query), limit, &mut out, cursors, now, stats)
                .await;
            if let Some(id) = &batch.newest {
                cursors.set_search_since_id(query, id);
            }
            if batch.limit_hit {
                break;
            }
        }
        out
    }

    fn merges_threads_of(&self, handle: &str) -> bool {
        self.thread_authors.contains(&normalize(handle))
    }

    /// Conversations of allow-listed authors with at least one reply in `posts`.
    /// Their first post is merged with the replies instead of emitted alone.
    fn threads_in_batch(&self, posts: &[StreamPost]) -> HashSet<String> {
        posts
            .iter()
            .filter(|p| p.is_thread_member() && self.merges_threads_of(&p.author_handle))
            .filter_map(|p| p.conversation_id.clone())
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_batch(
        &self,
        mut posts: Vec<StreamPost>,
        kind: SourceKind,
        query: Option<&str>,
        limit: usize,
        out: &mut Vec<CandidateItem>,
        cursors: &mut CursorStore,
        now: DateTime<Utc>,
        stats: &mut CollectStats,
    ) -> BatchOutcome {
        stats.fetched += posts.len();
        posts.sort_by(|a, b| compare_ids(&a.id, &b.id));
        let threads = self.threads_in_batch(&posts);

        let mut batch = BatchOutcome::default();
        for post in posts {
            if out.len() >= limit {
                stats.limit_reached += 1;
                tracing::info!(limit, kind = kind.as_str(), "per-cycle stream limit reached");
                batch.limit_hit = true;
                break;
            }
            batch.newest = Some(post.id.clone());
            if let Some(item) = self.admit(post, kind, query, &threads, cursors, now, stats).await {
                out.push(item);
            }
        }
        batch
    }

    #[allow(clippy::too_many_arguments)]
    async fn admit(
        &self,
        post: StreamPost,
        kind: SourceKind,
        query: Option<&str>,
        threads: &HashSet<String>,
        cursors: &mut CursorStore,
        now: DateTime<Utc>,
        stats: &mut CollectStats,
    ) -> Option<CandidateItem> {
        if let Some(conv) = post.conversation_id.as_deref() {
            if cursors.is_thread_processed(conv) {
                stats.thread_posts_skipped += 1;
                tracing::debug!(post_id = %post.id, conversation_id = conv, "post belongs to processed thread");
                return None;
            }
        }

        let reach = &self.cfg.reach_filter;
        if reach.enabled {
            if let Some(followers) = post.author_followers.filter(|f| *f < reach.min) {
                stats.rejected_reach += 1;
                counter!("curator_admission_rejected_total", "reason" => "reach").increment(1);
                tracing::info!(
                    post_id = %post.id,
                    author = %post.author_handle,
                    followers,
                    min = reach.min,
                    reason = "reach",
                    "stream post rejected"
                );
                return None;
            }
        }

        let engagement = engagement_score(&self.cfg.weights, post.likes, post.shares, post.replies);
        let eng = &self.cfg.engagement_filter;
        if eng.enabled && engagement < i64::try_from(eng.min).unwrap_or(i64::MAX) {
            stats.rejected_engagement += 1;
            counter!("curator_admission_rejected_total", "reason" => "engagement").increment(1);
            tracing::info!(
                post_id = %post.id,
                engagement,
                min = eng.min,
                reason = "engagement",
                "stream post rejected"
            );
            return None;
        }

        let in_thread = post.is_thread_member()
            || post.conversation_id.as_deref().is_some_and(|c| threads.contains(c));
        if in_thread && self.merges_threads_of(&post.author_handle) {
            if let Some(item) = self.merge_thread(&post, kind, query, cursors, now).await {
                stats.threads_merged += 1;
                return Some(item);
            }
        }

        Some(self.single_item(post, kind, query, engagement))
    }

    /// Fetch a whole thread once and mark it processed. `None` falls back to the single post.
    async fn merge_thread(
        &self,
        post: &StreamPost,
        kind: SourceKind,
        query: Option<&str>,
        cursors: &mut CursorStore,
        now: DateTime<Utc>,
    ) -> Option<CandidateItem> {
        let conv = post.conversation_id.as_deref()?;
        let mut posts = match self.client.thread_posts(conv, &post.author_handle).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = ?e, conversation_id = conv, "thread fetch failed, using single post");
                return None;
            }
        };
        if !posts.iter().any(|p| p.id == post.id) {
            posts.push(post.clone());
        }
        posts.sort_by(|a, b| compare_ids(&a.id, &b.id));
        posts.dedup_by(|a, b| a.id == b.id);
        if posts.len() < 2 {
            return None;
        }
        cursors.mark_thread_processed(conv, now);

        let raw = posts.iter().fold(0i64, |acc, p| {
            acc.saturating_add(engagement_score(&self.cfg.weights, p.likes, p.shares, p.replies))
        });
        let (likes, shares, replies) = posts.iter().fold((0, 0, 0), |(l, s, r), p| {
            (l + p.likes, s + p.shares, r + p.replies)
        });
        let root = &posts[0];
        let thread: Vec<ThreadPost> = posts
            .iter()
            .map(|p| ThreadPost {
                id: p.id.clone(),
                text: p.text.clone(),
                created_at: p.created_at,
            })
            .collect();
        let mut links: Vec<String> = Vec::new();
        for l in posts.iter().flat_map(|p| &p.links) {
            if !links.contains(l) {
                links.push(l.clone());
            }
        }
        tracing::info!(conversation_id = conv, posts = thread.len(), "thread merged");

        Some(CandidateItem {
            source: kind,
            title: normalize_text(&root.text, TITLE_MAX_CHARS),
            canonical_url: post_url(kind, &post.author_handle, conv),
            published_at: root.created_at,
            raw_score: raw,
            score: raw,
            category: Category::Unknown,
            detail: ItemDetail::Stream {
                post_id: conv.to_string(),
                author_handle: post.author_handle.clone(),
                author_id: post.author_id.clone(),
                author_followers: post.author_followers,
                text: root.text.clone(),
                likes,
                shares,
                replies,
                conversation_id: Some(conv.to_string()),
                query: query.map(str::to_string),
                thread,
                links,
                official: self.trust.is_official_account(&post.author_handle),
            },
        })
    }

    fn single_item(
        &self,
        post: StreamPost,
        kind: SourceKind,
        query: Option<&str>,
        engagement: i64,
    ) -> CandidateItem {
        let official = self.trust.is_official_account(&post.author_handle);
        CandidateItem {
            source: kind,
            title: normalize_text(&post.text, TITLE_MAX_CHARS),
            canonical_url: post_url(kind, &post.author_handle, &post.id),
            published_at: post.created_at,
            raw_score: engagement,
            score: engagement,
            category: Category::Unknown,
            detail: ItemDetail::Stream {
                post_id: post.id,
                author_handle: post.author_handle,
                author_id: post.author_id,
                author_followers: post.author_followers,
                text: post.text,
                likes: post.likes,
                shares: post.shares,
                replies: post.replies,
                conversation_id: post.conversation_id,
                query: query.map(str::to_string),
                thread: Vec::new(),
                links: post.links,
                official,
            },
        }
    }
}

/// Permalink of a post. Search results use the handle-free form.
pub fn post_url(kind: SourceKind, handle: &str, id: &str) -> String {
    match kind {
        SourceKind::StreamAccount => {
            format!("https://x.com/{}/status/{id}", handle.trim_start_matches('@'))
        }
        _ => format!("https://x.com/i/web/status/{id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScoringConfig, ThresholdFilter};
    use anyhow::{anyhow, Result};
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStream {
        posts: Vec<StreamPost>,
        thread: Vec<StreamPost>,
        thread_fails: bool,
        windows: Mutex<Vec<FetchWindow>>,
        resolves: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl StreamClient for FakeStream {
        async fn resolve_account(&self, handle: &str) -> Result<String> {
            *self.resolves.lock().unwrap() += 1;
            Ok(format!("id-{handle}"))
        }
        async fn account_posts(&self, _u: &str, w: &FetchWindow, _m: usize) -> Result<Vec<StreamPost>> {
            self.windows.lock().unwrap().push(w.clone());
            Ok(self.posts.clone())
        }
        async fn search_posts(&self, _q: &str, w: &FetchWindow, _m: usize) -> Result<Vec<StreamPost>> {
            self.windows.lock().unwrap().push(w.clone());
            Ok(self.posts.clone())
        }
        async fn thread_posts(&self, _c: &str, _a: &str) -> Result<Vec<StreamPost>> {
            if self.thread_fails {
                return Err(anyhow!("boom"));
            }
            Ok(self.thread.clone())
        }
        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn post(id: &str, likes: u64, followers: Option<u64>, conv: Option<&str>) -> StreamPost {
        StreamPost {
            id: id.into(),
            text: format!("post {id}"),
            created_at: now(),
            author_id: "1".into(),
            author_handle: "acme".into(),
            author_followers: followers,
            likes,
            shares: 0,
            replies: 0,
            conversation_id: conv.map(str::to_string),
            links: Vec::new(),
        }
    }

    fn cfg() -> StreamConfig {
        StreamConfig {
            accounts: vec!["acme".into()],
            searches: vec!["agents".into()],
            ..StreamConfig::default()
        }
    }

    #[tokio::test]
    async fn cold_start_then_since_id_and_user_id_cache() {
        let client = FakeStream {
            posts: vec![post("12", 1, None, None), post("9", 1, None, None)],
            ..Default::default()
        };
        let cfg = cfg();
        let trust = SourceTrust::from_config(&ScoringConfig::default());
        let sc = StreamCollector::new(&cfg, &trust, &client);
        let mut cursors = CursorStore::in_memory();
        let mut stats = CollectStats::default();

        let items = sc.collect_accounts(&mut cursors, now(), &mut stats).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].canonical_url, "https://x.com/acme/status/9");
        assert_eq!(cursors.account_since_id("acme"), Some("12"));

        sc.collect_accounts(&mut cursors, now(), &mut stats).await;
        let windows = client.windows.lock().unwrap().clone();
        assert_eq!(windows[0], FetchWindow::StartTime(now() - Duration::hours(24)));
        assert_eq!(windows[1], FetchWindow::SinceId("12".into()));
        assert_eq!(*client.resolves.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn admission_filters_count_each_rejection() {
        let client = FakeStream {
            posts: vec![
                post("1", 50, Some(10), None),   // low reach
                post("2", 0, Some(5_000), None), // low engagement
                post("3", 50, None, None),       // unknown reach passes
            ],
            ..Default::default()
        };
        let mut cfg = cfg();
        cfg.reach_filter = ThresholdFilter { enabled: true, min: 1_000 };
        cfg.engagement_filter = ThresholdFilter { enabled: true, min: 10 };
        let trust = SourceTrust::default();
        let sc = StreamCollector::new(&cfg, &trust, &client);
        let mut cursors = CursorStore::in_memory();
        let mut stats = CollectStats::default();

        let items = sc.collect_searches(&mut cursors, now(), &mut stats).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].canonical_url, "https://x.com/i/web/status/3");
        assert_eq!(stats.rejected_reach, 1);
        assert_eq!(stats.rejected_engagement, 1);
        // rejected posts still advance the cursor
        assert_eq!(cursors.search_since_id("agents"), Some("3"));
    }

    #[tokio::test]
    async fn limit_stops_and_keeps_unexamined_posts_for_next_cycle() {
        let client = FakeStream {
            posts: vec![post("1", 1, None, None), post("2", 1, None, None), post("3", 1, None, None)],
            ..Default::default()
        };
        let mut cfg = cfg();
        cfg.accounts = vec!["acme".into(), "beta".into()];
        cfg.limit_accounts = 2;
        let trust = SourceTrust::default();
        let sc = StreamCollector::new(&cfg, &trust, &client);
        let mut cursors = CursorStore::in_memory();
        let mut stats = CollectStats::default();

        let items = sc.collect_accounts(&mut cursors, now(), &mut stats).await;
        assert_eq!(items.len(), 2);
        // one limit event, even with accounts left to visit
        assert_eq!(stats.limit_reached, 1);
        assert_eq!(cursors.account_since_id("acme"), Some("2"));
        assert_eq!(cursors.account_since_id("beta"), None);
    }

    #[tokio::test]
    async fn first_post_and_replies_in_one_batch_become_one_thread() {
        let batch = vec![
            post("12", 1, None, Some("10")),
            post("10", 5, None, Some("10")),
            post("11", 2, None, Some("10")),
        ];
        let client = FakeStream {
            posts: batch.clone(),
            thread: batch,
            ..Default::default()
        };
        let mut cfg = cfg();
        cfg.thread_authors = vec!["acme".into()];
        let trust = SourceTrust::default();
        let sc = StreamCollector::new(&cfg, &trust, &client);
        let mut cursors = CursorStore::in_memory();
        let mut stats = CollectStats::default();

        let items = sc.collect_accounts(&mut cursors, now(), &mut stats).await;
        assert_eq!(items.len(), 1);
        let it = &items[0];
        assert!(it.is_thread());
        assert_eq!(it.canonical_url, "https://x.com/acme/status/10");
        assert_eq!(it.body(), "post 10\n\npost 11\n\npost 12");
        assert_eq!(stats.threads_merged, 1);
        assert_eq!(stats.thread_posts_skipped, 2);
        assert_eq!(cursors.account_since_id("acme"), Some("12"));
    }

    #[tokio::test]
    async fn first_post_without_replies_stays_single() {
        let client = FakeStream {
            posts: vec![post("10", 5, None, Some("10"))],
            ..Default::default()
        };
        let mut cfg = cfg();
        cfg.thread_authors = vec!["acme".into()];
        let trust = SourceTrust::default();
        let sc = StreamCollector::new(&cfg, &trust, &client);
        let mut cursors = CursorStore::in_memory();
        let mut stats = CollectStats::default();

        let items = sc.collect_accounts(&mut cursors, now(), &mut stats).await;
        assert_eq!(items.len(), 1);
        assert!(!items[0].is_thread());
        assert!(!cursors.is_thread_processed("10"));
    }

    #[tokio::test]
    async fn allow_listed_thread_is_merged_once() {
        let client = FakeStream {
            posts: vec![post("11", 2, None, Some("10"))],
            thread: vec![post("11", 2, None, Some("10")), post("10", 5, None, Some("10"))],
            ..Default::default()
        };
        let mut cfg = cfg();
        cfg.thread_authors = vec!["@Acme".into()];
        let trust = SourceTrust::default();
        let sc = StreamCollector::new(&cfg, &trust, &client);
        let mut cursors = CursorStore::in_memory();
        let mut stats = CollectStats::default();

        let items = sc.collect_accounts(&mut cursors, now(), &mut stats).await;
        assert_eq!(items.len(), 1);
        let it = &items[0];
        assert!(it.is_thread());
        assert_eq!(it.canonical_url, "https://x.com/acme/status/10");
        assert_eq!(it.raw_score, 7);
        assert_eq!(it.body(), "post 10\n\npost 11");
        assert!(cursors.is_thread_processed("10"));

        // a later post of the same conversation is skipped
        let later = FakeStream {
            posts: vec![post("12", 2, None, Some("10"))],
            ..Default::default()
        };
        let sc = StreamCollector::new(&cfg, &trust, &later);
        let items = sc.collect_accounts(&mut cursors, now(), &mut stats).await;
        assert!(items.is_empty());
        assert_eq!(stats.thread_posts_skipped, 1);
    }

    #[tokio::test]
    async fn failed_thread_fetch_falls_back_to_single_post() {
        let client = FakeStream {
            posts: vec![post("11", 2, None, Some("10"))],
            thread_fails: true,
            ..Default::default()
        };
        let mut cfg = cfg();
        cfg.thread_authors = vec!["acme".into()];
        let trust = SourceTrust::default();
        let sc = StreamCollector::new(&cfg, &trust, &client);
        let mut cursors = CursorStore::in_memory();
        let mut stats = CollectStats::default();

        let items = sc.collect_accounts(&mut cursors, now(), &mut stats).await;
        assert_eq!(items.len(), 1);
        assert!(!items[0].is_thread());
        assert!(!cursors.is_thread_processed("10"));
    }
}
