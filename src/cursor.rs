// src/cursor.rs
//! Per-source incremental position and dedup-horizon state.
//!
//! The whole document is loaded once at process start, mutated in memory by the
//! single run, and rewritten atomically by [`CursorStore::save`] at the very end
//! of a successful run. An aborted run persists nothing.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::persist;

pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountCursor {
    /// Cached API user id, so later cycles skip the handle lookup.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub since_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchCursor {
    #[serde(default)]
    pub since_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedCursor {
    /// Most recent first.
    #[serde(default)]
    pub seen_urls: Vec<String>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageCursor {
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMeta {
    pub last_run_at: Option<DateTime<Utc>>,
    pub version: u32,
}

impl Default for RunMeta {
    fn default() -> Self {
        Self {
            last_run_at: None,
            version: STATE_VERSION,
        }
    }
}

/// The persisted document, keyed by source type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CursorState {
    pub stream_accounts: BTreeMap<String, AccountCursor>,
    pub stream_searches: BTreeMap<String, SearchCursor>,
    pub feeds: BTreeMap<String, FeedCursor>,
    pub pages: BTreeMap<String, PageCursor>,
    /// Canonical URL → time the draft was created.
    pub recently_posted: BTreeMap<String, DateTime<Utc>>,
    /// Conversation id → time the thread was emitted.
    pub processed_threads: BTreeMap<String, DateTime<Utc>>,
    pub meta: RunMeta,
}

/// Numeric ordering for snowflake-style ids kept as strings.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Largest id of a batch (numeric ordering).
pub fn max_id<'a, I: IntoIterator<Item = &'a str>>(ids: I) -> Option<&'a str> {
    ids.into_iter().max_by(|a, b| compare_ids(a, b))
}

#[derive(Debug)]
pub struct CursorStore {
    path: Option<PathBuf>,
    state: CursorState,
}

impl CursorStore {
    /// Load from disk; a missing file starts from an empty state.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = persist::read_json::<CursorState>(&path)?.unwrap_or_default();
        tracing::debug!(
            path = %path.display(),
            feeds = state.feeds.len(),
            accounts = state.stream_accounts.len(),
            "cursor state loaded"
        );
        Ok(Self {
            path: Some(path),
            state,
        })
    }

    /// Store without a backing file (tests, dry runs).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: CursorState::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    // ---- stream accounts ----

    pub fn account_since_id(&self, handle: &str) -> Option<&str> {
        self.state
            .stream_accounts
            .get(handle)
            .and_then(|c| c.since_id.as_deref())
    }

    /// Advance the last-seen id. Returns false when `id` is not newer.
    pub fn set_account_since_id(&mut self, handle: &str, id: &str) -> bool {
        let entry = self.state.stream_accounts.entry(handle.to_string()).or_default();
        advance(&mut entry.since_id, id)
    }

    pub fn account_user_id(&self, handle: &str) -> Option<&str> {
        self.state
            .stream_accounts
            .get(handle)
            .and_then(|c| c.user_id.as_deref())
    }

    pub fn set_account_user_id(&mut self, handle: &str, user_id: &str) {
        self.state
            .stream_accounts
            .entry(handle.to_string())
            .or_default()
            .user_id = Some(user_id.to_string());
    }

    // ---- stream searches ----

    pub fn search_since_id(&self, query: &str) -> Option<&str> {
        self.state
            .stream_searches
            .get(query)
            .and_then(|c| c.since_id.as_deref())
    }

    pub fn set_search_since_id(&mut self, query: &str, id: &str) -> bool {
        let entry = self.state.stream_searches.entry(query.to_string()).or_default();
        advance(&mut entry.since_id, id)
    }

    // ---- feeds ----

    pub fn feed_seen_urls(&self, feed_url: &str) -> HashSet<&str> {
        self.state
            .feeds
            .get(feed_url)
            .map(|c| c.seen_urls.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn has_feed_cursor(&self, feed_url: &str) -> bool {
        self.state.feeds.contains_key(feed_url)
    }

    /// Record this cycle's URL list. Current URLs go first, then previously seen
    /// URLs that dropped out of the feed, truncated to `cap`.
    pub fn set_feed_seen_urls(
        &mut self,
        feed_url: &str,
        current: &[String],
        cap: usize,
        now: DateTime<Utc>,
    ) {
        let entry = self.state.feeds.entry(feed_url.to_string()).or_default();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut merged = Vec::with_capacity(current.len() + entry.seen_urls.len());
        for u in current.iter().chain(entry.seen_urls.iter()) {
            if seen.insert(u.as_str()) {
                merged.push(u.clone());
            }
        }
        merged.truncate(cap);
        entry.seen_urls = merged;
        entry.last_checked = Some(now);
    }

    // ---- pages ----

    pub fn page(&self, page_url: &str) -> Option<&PageCursor> {
        self.state.pages.get(page_url)
    }

    pub fn set_page(&mut self, page_url: &str, content_hash: &str, now: DateTime<Utc>) {
        let entry = self.state.pages.entry(page_url.to_string()).or_default();
        if entry.last_checked.is_some_and(|t| t > now) {
            return;
        }
        entry.content_hash = Some(content_hash.to_string());
        entry.last_checked = Some(now);
    }

    // ---- recently posted ----

    pub fn is_recently_posted(&self, url: &str) -> bool {
        self.state.recently_posted.contains_key(url)
    }

    pub fn mark_posted(&mut self, url: &str, now: DateTime<Utc>) {
        self.state.recently_posted.insert(url.to_string(), now);
    }

    pub fn recently_posted_urls(&self) -> impl Iterator<Item = &str> {
        self.state.recently_posted.keys().map(String::as_str)
    }

    /// Drop recently-posted entries older than `ttl`. Returns how many were removed.
    pub fn cleanup_posted(&mut self, ttl: Duration, now: DateTime<Utc>) -> usize {
        purge_older_than(&mut self.state.recently_posted, now - ttl)
    }

    // ---- processed threads ----

    pub fn is_thread_processed(&self, conversation_id: &str) -> bool {
        self.state.processed_threads.contains_key(conversation_id)
    }

    pub fn mark_thread_processed(&mut self, conversation_id: &str, now: DateTime<Utc>) {
        self.state
            .processed_threads
            .insert(conversation_id.to_string(), now);
    }

    pub fn cleanup_threads(&mut self, ttl: Duration, now: DateTime<Utc>) -> usize {
        purge_older_than(&mut self.state.processed_threads, now - ttl)
    }

    // ---- persistence ----

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.state.meta.last_run_at
    }

    /// Stamp run metadata and rewrite the whole document atomically.
    pub fn save(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.state.meta.last_run_at = Some(now);
        self.state.meta.version = STATE_VERSION;
        if let Some(path) = &self.path {
            persist::write_json_atomic(path, &self.state)?;
            tracing::info!(path = %path.display(), "cursor state saved");
        }
        Ok(())
    }
}

fn advance(slot: &mut Option<String>, id: &str) -> bool {
    match slot.as_deref() {
        Some(cur) if compare_ids(id, cur) != Ordering::Greater => false,
        _ => {
            *slot = Some(id.to_string());
            true
        }
    }
}

fn purge_older_than(map: &mut BTreeMap<String, DateTime<Utc>>, cutoff: DateTime<Utc>) -> usize {
    let before = map.len();
    map.retain(|_, ts| *ts >= cutoff);
    before - map.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, 0, 0).unwrap()
    }

    #[test]
    fn since_id_never_moves_backward() {
        let mut c = CursorStore::in_memory();
        assert!(c.set_account_since_id("acme", "100"));
        assert!(!c.set_account_since_id("acme", "99"));
        assert!(!c.set_account_since_id("acme", "100"));
        assert_eq!(c.account_since_id("acme"), Some("100"));
        // numeric, not lexicographic: "1000" > "999"
        assert!(c.set_search_since_id("q", "999"));
        assert!(c.set_search_since_id("q", "1000"));
        assert_eq!(c.search_since_id("q"), Some("1000"));
    }

    #[test]
    fn user_id_cache_survives_since_id_updates() {
        let mut c = CursorStore::in_memory();
        c.set_account_user_id("acme", "42");
        c.set_account_since_id("acme", "5");
        assert_eq!(c.account_user_id("acme"), Some("42"));
    }

    #[test]
    fn seen_urls_merge_current_first_and_cap() {
        let mut c = CursorStore::in_memory();
        let first: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        c.set_feed_seen_urls("f", &first, 4, t(1));
        let second: Vec<String> = vec!["d".into(), "a".into()];
        c.set_feed_seen_urls("f", &second, 4, t(2));
        assert_eq!(c.state().feeds["f"].seen_urls, vec!["d", "a", "b", "c"]);
        c.set_feed_seen_urls("f", &["e".to_string()], 4, t(3));
        assert_eq!(c.state().feeds["f"].seen_urls, vec!["e", "d", "a", "b"]);
        assert_eq!(c.state().feeds["f"].last_checked, Some(t(3)));
    }

    #[test]
    fn ttl_cleanup_drops_only_expired() {
        let mut c = CursorStore::in_memory();
        c.mark_posted("https://old", t(0));
        c.mark_posted("https://new", t(20));
        assert_eq!(c.cleanup_posted(Duration::hours(12), t(23)), 1);
        assert!(c.is_recently_posted("https://new"));
        assert!(!c.is_recently_posted("https://old"));

        c.mark_thread_processed("77", t(0));
        assert_eq!(c.cleanup_threads(Duration::days(7), t(23)), 0);
        assert!(c.is_thread_processed("77"));
    }

    #[test]
    fn save_then_load_round_trips_with_meta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut c = CursorStore::load(&path).unwrap();
        c.set_account_since_id("acme", "12");
        c.set_page("https://p", "abc", t(4));
        c.save(t(5)).unwrap();

        let back = CursorStore::load(&path).unwrap();
        assert_eq!(back.account_since_id("acme"), Some("12"));
        assert_eq!(back.page("https://p").unwrap().content_hash.as_deref(), Some("abc"));
        assert_eq!(back.last_run_at(), Some(t(5)));
        assert_eq!(back.state().meta.version, STATE_VERSION);
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "][").unwrap();
        assert!(CursorStore::load(&path).is_err());
    }
}
