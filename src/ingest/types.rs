// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    StreamAccount,
    StreamSearch,
    Feed,
    MustIncludeFeed,
    MonitoredPage,
}

/// Selection pools used by quota mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourcePool {
    MustInclude,
    Feed,
    Stream,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::StreamAccount => "stream_account",
            SourceKind::StreamSearch => "stream_search",
            SourceKind::Feed => "feed",
            SourceKind::MustIncludeFeed => "must_include_feed",
            SourceKind::MonitoredPage => "monitored_page",
        }
    }

    pub fn pool(&self) -> SourcePool {
        match self {
            SourceKind::MustIncludeFeed => SourcePool::MustInclude,
            SourceKind::Feed | SourceKind::MonitoredPage => SourcePool::Feed,
            SourceKind::StreamAccount | SourceKind::StreamSearch => SourcePool::Stream,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Practical,
    Technical,
    General,
    Marketing,
    #[default]
    Unknown,
    Excluded,
    PersonalUsage,
    LowCredibility,
    NonEnglish,
    ExcludedOrigin,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Practical => "PRACTICAL",
            Category::Technical => "TECHNICAL",
            Category::General => "GENERAL",
            Category::Marketing => "MARKETING",
            Category::Unknown => "UNKNOWN",
            Category::Excluded => "EXCLUDED",
            Category::PersonalUsage => "PERSONAL_USAGE",
            Category::LowCredibility => "LOW_CREDIBILITY",
            Category::NonEnglish => "NON_ENGLISH",
            Category::ExcludedOrigin => "EXCLUDED_ORIGIN",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadPost {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Source-specific payload of a candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemDetail {
    Stream {
        post_id: String,
        author_handle: String,
        author_id: String,
        /// `None` when the API did not report a follower count.
        author_followers: Option<u64>,
        text: String,
        likes: u64,
        shares: u64,
        replies: u64,
        conversation_id: Option<String>,
        /// Search term that surfaced the post (search sources only).
        query: Option<String>,
        /// Ordered posts when the candidate is a merged thread; empty otherwise.
        #[serde(default)]
        thread: Vec<ThreadPost>,
        /// Expanded targets of the shortened links in `text`, in order.
        #[serde(default)]
        links: Vec<String>,
        official: bool,
    },
    Feed {
        feed_url: String,
        feed_name: String,
        summary: String,
        official: bool,
    },
    Page {
        page_url: String,
        page_name: String,
        content_hash: String,
        official: bool,
    },
}

/// One candidate for a post. Built fresh every cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateItem {
    pub source: SourceKind,
    pub title: String,
    pub canonical_url: String,
    pub published_at: DateTime<Utc>,
    /// Popularity / base score before classification.
    pub raw_score: i64,
    /// Rank score after category bonus and trust multiplier.
    pub score: i64,
    #[serde(default)]
    pub category: Category,
    pub detail: ItemDetail,
}

impl CandidateItem {
    /// Body text used for classification and prompting.
    pub fn body(&self) -> String {
        match &self.detail {
            ItemDetail::Stream { thread, .. } if !thread.is_empty() => thread
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            ItemDetail::Stream { text, .. } => text.clone(),
            ItemDetail::Feed { summary, .. } => summary.clone(),
            ItemDetail::Page { .. } => String::new(),
        }
    }

    pub fn is_official(&self) -> bool {
        match &self.detail {
            ItemDetail::Stream { official, .. }
            | ItemDetail::Feed { official, .. }
            | ItemDetail::Page { official, .. } => *official || self.is_must_include(),
        }
    }

    pub fn is_must_include(&self) -> bool {
        self.source == SourceKind::MustIncludeFeed
    }

    pub fn is_thread(&self) -> bool {
        matches!(&self.detail, ItemDetail::Stream { thread, .. } if !thread.is_empty())
    }

    /// Short label for logs and digests (feed name, `@handle`, page name).
    pub fn origin_label(&self) -> String {
        match &self.detail {
            ItemDetail::Stream { author_handle, .. } => format!("@{author_handle}"),
            ItemDetail::Feed { feed_name, .. } => feed_name.clone(),
            ItemDetail::Page { page_name, .. } => page_name.clone(),
        }
    }

    /// Feed URL for feed-pool items (diversity key).
    pub fn feed_key(&self) -> Option<&str> {
        match &self.detail {
            ItemDetail::Feed { feed_url, .. } => Some(feed_url),
            ItemDetail::Page { page_url, .. } => Some(page_url),
            ItemDetail::Stream { .. } => None,
        }
    }
}

/// A post as returned by the stream API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPost {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: String,
    pub author_handle: String,
    pub author_followers: Option<u64>,
    pub likes: u64,
    pub shares: u64,
    pub replies: u64,
    pub conversation_id: Option<String>,
    /// Expanded link targets reported alongside the text.
    pub links: Vec<String>,
}

impl StreamPost {
    /// Part of a multi-post thread but not its root.
    pub fn is_thread_member(&self) -> bool {
        self.conversation_id
            .as_deref()
            .is_some_and(|c| !c.is_empty() && c != self.id)
    }
}

/// One entry of an RSS/Atom feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
}

/// How far back a stream fetch reaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchWindow {
    /// Strictly newer than this id.
    SinceId(String),
    /// Cold start: everything since this instant.
    StartTime(DateTime<Utc>),
}

#[async_trait::async_trait]
pub trait StreamClient: Send + Sync {
    /// Resolve a handle to the API's user id.
    async fn resolve_account(&self, handle: &str) -> Result<String>;
    async fn account_posts(
        &self,
        user_id: &str,
        window: &FetchWindow,
        max_results: usize,
    ) -> Result<Vec<StreamPost>>;
    async fn search_posts(
        &self,
        query: &str,
        window: &FetchWindow,
        max_results: usize,
    ) -> Result<Vec<StreamPost>>;
    /// All posts of a conversation by one author, oldest first.
    async fn thread_posts(&self, conversation_id: &str, author_handle: &str)
        -> Result<Vec<StreamPost>>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>>;
}

#[async_trait::async_trait]
pub trait PageClient: Send + Sync {
    /// Raw page body.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_item(thread: Vec<ThreadPost>) -> CandidateItem {
        CandidateItem {
            source: SourceKind::StreamAccount,
            title: "t".into(),
            canonical_url: "https://x.com/acme/status/1".into(),
            published_at: Utc::now(),
            raw_score: 0,
            score: 0,
            category: Category::Unknown,
            detail: ItemDetail::Stream {
                post_id: "1".into(),
                author_handle: "acme".into(),
                author_id: "42".into(),
                author_followers: None,
                text: "single".into(),
                likes: 0,
                shares: 0,
                replies: 0,
                conversation_id: None,
                query: None,
                thread,
                links: Vec::new(),
                official: false,
            },
        }
    }

    #[test]
    fn pools_group_pages_with_feeds() {
        assert_eq!(SourceKind::MonitoredPage.pool(), SourcePool::Feed);
        assert_eq!(SourceKind::StreamSearch.pool(), SourcePool::Stream);
        assert_eq!(SourceKind::MustIncludeFeed.pool(), SourcePool::MustInclude);
    }

    #[test]
    fn thread_body_joins_posts_in_order() {
        let now = Utc::now();
        let item = stream_item(vec![
            ThreadPost { id: "1".into(), text: "first".into(), created_at: now },
            ThreadPost { id: "2".into(), text: "second".into(), created_at: now },
        ]);
        assert!(item.is_thread());
        assert_eq!(item.body(), "first\n\nsecond");
        assert_eq!(stream_item(vec![]).body(), "single");
    }

    #[test]
    fn thread_membership_needs_foreign_conversation_id() {
        let mut p = StreamPost {
            id: "10".into(),
            text: String::new(),
            created_at: Utc::now(),
            author_id: "1".into(),
            author_handle: "a".into(),
            author_followers: None,
            likes: 0,
            shares: 0,
            replies: 0,
            conversation_id: Some("10".into()),
            links: Vec::new(),
        };
        assert!(!p.is_thread_member());
        p.conversation_id = Some("7".into());
        assert!(p.is_thread_member());
        p.conversation_id = None;
        assert!(!p.is_thread_member());
    }

    #[test]
    fn category_serializes_screaming_snake() {
        let s = serde_json::to_string(&Category::PersonalUsage).unwrap();
        assert_eq!(s, "\"PERSONAL_USAGE\"");
        assert_eq!(Category::NonEnglish.as_str(), "NON_ENGLISH");
    }
}
