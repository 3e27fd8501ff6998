// src/ingest/providers/x_api.rs
//! Stream client for the v2 social API (bearer-token, read only).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::http_client;
use crate::ingest::types::{FetchWindow, StreamClient, StreamPost};

const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";
const TWEET_FIELDS: &str = "created_at,public_metrics,conversation_id,author_id,entities";
const THREAD_MAX: usize = 10;

#[derive(Debug, Deserialize)]
struct UserLookup {
    data: Option<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    public_metrics: Option<UserMetrics>,
}

#[derive(Debug, Deserialize)]
struct UserMetrics {
    #[serde(default)]
    followers_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TweetsResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    public_metrics: Option<TweetMetrics>,
    #[serde(default)]
    entities: Option<Entities>,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    urls: Vec<UrlEntity>,
}

/// A link in the post text. `url` is the shortened form shown in `text`.
#[derive(Debug, Deserialize)]
struct UrlEntity {
    #[serde(default)]
    expanded_url: Option<String>,
    #[serde(default)]
    unwound_url: Option<String>,
}

impl UrlEntity {
    /// Final target when the API unwound redirects, else the expanded link.
    fn target(self) -> Option<String> {
        self.unwound_url
            .or(self.expanded_url)
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
struct TweetMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
}

/// Convert an API page into posts. `handle` fills in the author when the
/// response carries no user expansion (account timelines).
fn to_posts(resp: TweetsResponse, handle: Option<&str>) -> Vec<StreamPost> {
    let users: HashMap<String, User> = resp
        .includes
        .map(|i| i.users.into_iter().map(|u| (u.id.clone(), u)).collect())
        .unwrap_or_default();

    resp.data
        .into_iter()
        .filter_map(|t| {
            let Some(created_at) = t.created_at else {
                tracing::debug!(id = %t.id, "post without created_at skipped");
                return None;
            };
            let author_id = t.author_id.unwrap_or_default();
            let user = users.get(&author_id);
            let author_handle = user
                .and_then(|u| u.username.clone())
                .or_else(|| handle.map(str::to_string))
                .unwrap_or_default();
            let author_followers = user
                .and_then(|u| u.public_metrics.as_ref())
                .and_then(|m| m.followers_count);
            let m = t.public_metrics.unwrap_or_default();
            let links = t
                .entities
                .map(|e| e.urls.into_iter().filter_map(UrlEntity::target).collect())
                .unwrap_or_default();
            Some(StreamPost {
                id: t.id,
                text: t.text,
                created_at,
                author_id,
                author_handle,
                author_followers,
                likes: m.like_count,
                shares: m.retweet_count,
                replies: m.reply_count,
                conversation_id: t.conversation_id,
                links,
            })
        })
        .collect()
}

fn parse_tweets(body: &str, handle: Option<&str>) -> Result<Vec<StreamPost>> {
    let resp: TweetsResponse = serde_json::from_str(body).context("decoding posts response")?;
    Ok(to_posts(resp, handle))
}

pub struct XApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer: String,
}

impl XApiClient {
    pub fn new(bearer: String) -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(15))?,
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer,
        })
    }

    /// `None` when X_BEARER_TOKEN is unset; stream sources are then skipped.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var("X_BEARER_TOKEN").ok().filter(|t| !t.trim().is_empty()) {
            Some(token) => Ok(Some(Self::new(token)?)),
            None => Ok(None),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer)
            .query(params)
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        let status = resp.status();
        let body = resp.text().await.context("reading response body")?;
        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(anyhow!("stream api {path} returned {status}: {snippet}"));
        }
        Ok(body)
    }

    fn window_params(window: &FetchWindow, params: &mut Vec<(&'static str, String)>) {
        match window {
            FetchWindow::SinceId(id) => params.push(("since_id", id.clone())),
            FetchWindow::StartTime(t) => {
                params.push(("start_time", t.to_rfc3339_opts(SecondsFormat::Secs, true)))
            }
        }
    }
}

#[async_trait]
impl StreamClient for XApiClient {
    async fn resolve_account(&self, handle: &str) -> Result<String> {
        let h = handle.trim_start_matches('@');
        let body = self.get(&format!("/users/by/username/{h}"), &[]).await?;
        let lookup: UserLookup = serde_json::from_str(&body).context("decoding user lookup")?;
        lookup
            .data
            .map(|u| u.id)
            .ok_or_else(|| anyhow!("unknown account @{h}"))
    }

    async fn account_posts(
        &self,
        user_id: &str,
        window: &FetchWindow,
        max_results: usize,
    ) -> Result<Vec<StreamPost>> {
        let mut params = vec![
            ("max_results", max_results.clamp(5, 100).to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", "public_metrics,username".to_string()),
        ];
        Self::window_params(window, &mut params);
        let body = self.get(&format!("/users/{user_id}/tweets"), &params).await?;
        parse_tweets(&body, None)
    }

    async fn search_posts(
        &self,
        query: &str,
        window: &FetchWindow,
        max_results: usize,
    ) -> Result<Vec<StreamPost>> {
        let mut params = vec![
            ("query", query.to_string()),
            ("max_results", max_results.clamp(10, 100).to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", "public_metrics,username".to_string()),
        ];
        Self::window_params(window, &mut params);
        let body = self.get("/tweets/search/recent", &params).await?;
        parse_tweets(&body, None)
    }

    async fn thread_posts(&self, conversation_id: &str, author_handle: &str) -> Result<Vec<StreamPost>> {
        let h = author_handle.trim_start_matches('@');
        let params = vec![
            ("query", format!("conversation_id:{conversation_id} from:{h}")),
            ("max_results", THREAD_MAX.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        let body = self.get("/tweets/search/recent", &params).await?;
        let mut posts = parse_tweets(&body, Some(h))?;
        posts.sort_by_key(|p| p.created_at);
        Ok(posts)
    }

    fn name(&self) -> &'static str {
        "x_api"
    }
}
