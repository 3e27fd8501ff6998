// src/ingest/providers/mod.rs
//! HTTP implementations of the source client traits.

pub mod rss;
pub mod web;
pub mod x_api;

use anyhow::{Context, Result};
use std::time::Duration;

pub const USER_AGENT: &str = concat!("feed-curator/", env!("CARGO_PKG_VERSION"));

/// Shared client shape: fixed connect timeout, per-call total timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .context("building http client")
}
