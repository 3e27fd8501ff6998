//! Wires concrete HTTP collaborators from configuration and environment.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::analyze::ai_adapter::build_backend;
use crate::compose::lint::LintChecker;
use crate::compose::review::ReviewGate;
use crate::compose::Composer;
use crate::config::AppConfig;
use crate::ingest::providers::rss::HttpFeedClient;
use crate::ingest::providers::web::{HttpArticleFetcher, HttpPageClient};
use crate::ingest::providers::x_api::XApiClient;
use crate::ingest::types::StreamClient;
use crate::ingest::SourceClients;
use crate::notify::ChannelMux;

pub struct Services {
    pub stream: Option<XApiClient>,
    pub feeds: HttpFeedClient,
    pub pages: HttpPageClient,
    pub composer: Composer,
    pub mux: ChannelMux,
}

impl Services {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let stream = XApiClient::from_env()?;
        if stream.is_none() {
            warn!("X_BEARER_TOKEN not set, stream sources disabled");
        }

        let generation = build_backend(&cfg.generation)?;
        let review_backend = build_backend(&cfg.review.as_generation())?;
        // Safe diagnostics: provider names only
        info!(
            generation = generation.provider_name(),
            review = review_backend.provider_name(),
            review_enabled = cfg.review.enabled,
            fail_open = cfg.review.fail_open,
            "generative backends ready"
        );
        let review = ReviewGate::new(Some(review_backend), cfg.review.enabled, cfg.review.fail_open);
        let lint = LintChecker::with_rules_file(cfg.compose.lint_rules_path.as_deref())?;
        let composer = Composer::new(&cfg.compose, generation, lint, review)
            .with_article_fetcher(Arc::new(HttpArticleFetcher::new()?));

        Ok(Self {
            stream,
            feeds: HttpFeedClient::new()?,
            pages: HttpPageClient::new()?,
            composer,
            mux: ChannelMux::from_env(Duration::from_millis(cfg.publish.inter_message_delay_ms)),
        })
    }

    pub fn clients(&self) -> SourceClients<'_> {
        SourceClients {
            stream: self.stream.as_ref().map(|s| s as &dyn StreamClient),
            feeds: &self.feeds,
            pages: &self.pages,
        }
    }
}
