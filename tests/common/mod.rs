//! Shared fakes for integration tests: scripted feed/page clients and helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};

use feed_curator::ingest::providers::rss::parse_feed;
use feed_curator::ingest::types::{FeedClient, FeedEntry, PageClient};

pub fn fixture(name: &str) -> String {
    let p = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    std::fs::read_to_string(&p).unwrap_or_else(|e| panic!("fixture {}: {e}", p.display()))
}

/// Reference "now" matching the fixture dates.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

/// Feed client serving XML documents per URL; unknown URLs fail.
#[derive(Default)]
pub struct FixtureFeeds {
    docs: Mutex<HashMap<String, String>>,
}

impl FixtureFeeds {
    pub fn with(self, url: &str, fixture_name: &str) -> Self {
        self.set(url, fixture_name);
        self
    }

    pub fn set(&self, url: &str, fixture_name: &str) {
        self.docs.lock().unwrap().insert(url.to_string(), fixture(fixture_name));
    }

    pub fn set_xml(&self, url: &str, xml: &str) {
        self.docs.lock().unwrap().insert(url.to_string(), xml.to_string());
    }
}

#[async_trait::async_trait]
impl FeedClient for FixtureFeeds {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let xml = self
            .docs
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP 503 for {url}"))?;
        parse_feed(&xml)
    }
}

/// Page client serving fixed bodies per URL.
#[derive(Default)]
pub struct StaticPages {
    bodies: Mutex<HashMap<String, String>>,
}

impl StaticPages {
    pub fn set(&self, url: &str, body: &str) {
        self.bodies.lock().unwrap().insert(url.to_string(), body.to_string());
    }
}

#[async_trait::async_trait]
impl PageClient for StaticPages {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP 404 for {url}"))
    }
}

/// A clean draft long enough to pass validation.
pub fn good_draft(topic: &str) -> String {
    format!("{topic}: the update ships today and changes how existing API clients connect, so check the migration notes.")
}

pub const REVIEW_OK: &str = r#"{"is_valid": true, "issues": [], "explanation": "matches title"}"#;
