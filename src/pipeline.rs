//! One curation cycle, end to end:
//! cleanup → collect → classify + score → dedup → select → compose → digest → save.
//!
//! Per-candidate failures (generation errors, rejections) are logged and the
//! cycle continues. Persistence failures abort the cycle with an error and the
//! cursor document is left as it was on disk.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use crate::analyze::classifier::Classifier;
use crate::analyze::scoring::Scorer;
use crate::compose::{ComposeOutcome, Composer};
use crate::config::AppConfig;
use crate::cursor::CursorStore;
use crate::dedup::{dedup_candidates, DedupStats, UrlCanonicalizer};
use crate::drafts::{DraftError, DraftRecord, DraftStore};
use crate::ingest::{CollectStats, Collector, SourceClients};
use crate::notify::{ChannelMux, OutboundMessage};
use crate::select::select;
use crate::source_trust::SourceTrust;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    #[serde(skip)]
    pub collected: CollectStats,
    pub candidates: usize,
    pub same_run_duplicates: usize,
    pub lookback_duplicates: usize,
    pub selected: usize,
    pub drafts_created: Vec<Uuid>,
    pub rejected: usize,
    pub compose_errors: usize,
    pub digests_sent: usize,
}

pub struct Pipeline<'a> {
    cfg: &'a AppConfig,
    trust: SourceTrust,
    classifier: Classifier,
    scorer: Scorer,
    canon: UrlCanonicalizer,
    clients: SourceClients<'a>,
    composer: &'a Composer,
    mux: &'a ChannelMux,
}

impl<'a> Pipeline<'a> {
    pub fn new(cfg: &'a AppConfig, clients: SourceClients<'a>, composer: &'a Composer, mux: &'a ChannelMux) -> Self {
        let trust = SourceTrust::from_config(&cfg.scoring);
        Self {
            cfg,
            classifier: Classifier::from_config(&cfg.classifier),
            scorer: Scorer::new(cfg.scoring.bonuses.clone(), trust.clone()),
            canon: UrlCanonicalizer::new(&cfg.dedup.host_aliases),
            trust,
            clients,
            composer,
            mux,
        }
    }

    /// URLs that must not resurface: drafts inside the lookback window plus
    /// recently posted URLs.
    fn history(&self, cursors: &CursorStore, drafts: &DraftStore, now: DateTime<Utc>) -> HashSet<String> {
        let mut h = drafts.urls_created_since(now - Duration::days(self.cfg.dedup.lookback_days));
        h.extend(cursors.recently_posted_urls().map(str::to_string));
        h
    }

    pub async fn run_cycle(
        &self,
        cursors: &mut CursorStore,
        drafts: &mut DraftStore,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        let mut report = RunReport::default();

        let purged_posted = cursors.cleanup_posted(Duration::hours(self.cfg.dedup.posted_ttl_hours), now);
        let purged_threads = cursors.cleanup_threads(Duration::days(self.cfg.dedup.thread_ttl_days), now);
        tracing::debug!(purged_posted, purged_threads, "cursor horizons cleaned");

        let collector = Collector::new(self.cfg, &self.trust, self.clients);
        let (mut items, stats) = collector.collect(cursors, now).await;
        report.collected = stats;

        self.classifier.classify_all(&mut items);
        self.scorer.score_all(&mut items);

        let history = self.history(cursors, drafts, now);
        let (items, DedupStats { same_run, lookback }) = dedup_candidates(items, &self.canon, &history);
        report.candidates = items.len();
        report.same_run_duplicates = same_run;
        report.lookback_duplicates = lookback;

        let selected = select(items, &self.cfg.selection, &self.cfg.feed_priority_order());
        report.selected = selected.len();

        let mut digests = Vec::new();
        for item in selected {
            let outcome = match self.composer.compose(&item).await {
                Ok(o) => o,
                Err(e) => {
                    report.compose_errors += 1;
                    tracing::warn!(url = %item.canonical_url, error = %e, "drafting failed, skipping candidate");
                    continue;
                }
            };
            match outcome {
                ComposeOutcome::Accepted { text, lint, attempts, .. } => {
                    let url = item.canonical_url.clone();
                    let record = DraftRecord::new(item, text, now);
                    digests.push(OutboundMessage::review(&record));
                    let id = drafts.append(record);
                    drafts.save().context("saving drafts")?;
                    cursors.mark_posted(&url, now);
                    counter!("curator_drafts_created_total").increment(1);
                    tracing::info!(%id, url = %url, lint_score = lint.score, attempts, "draft created");
                    report.drafts_created.push(id);
                }
                ComposeOutcome::Rejected { .. } => report.rejected += 1,
            }
        }

        report.digests_sent = self.mux.publish_all(&digests).await;

        cursors.save(now).context("saving cursor state")?;
        tracing::info!(
            candidates = report.candidates,
            selected = report.selected,
            drafts = report.drafts_created.len(),
            rejected = report.rejected,
            errors = report.compose_errors,
            "cycle finished"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostReport {
    pub posted: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

/// Publish pending drafts (or the one named by `only`) and mark each posted
/// once at least one channel accepted it.
pub async fn post_pending_drafts(
    drafts: &mut DraftStore,
    mux: &ChannelMux,
    only: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PostReport> {
    if mux.is_empty() {
        anyhow::bail!("no outbound channels configured");
    }
    let targets: Vec<DraftRecord> = match only {
        Some(id) => {
            let d = drafts.get(id).ok_or_else(|| DraftError::NotFound(id.to_string()))?;
            if d.status != crate::drafts::DraftStatus::Pending {
                return Err(DraftError::AlreadyPosted(d.id).into());
            }
            vec![d.clone()]
        }
        None => drafts.pending().cloned().collect(),
    };

    let mut report = PostReport::default();
    for (i, d) in targets.iter().enumerate() {
        if i > 0 {
            mux.pause().await;
        }
        if mux.publish(&OutboundMessage::post(d)).await {
            drafts.mark_posted(&d.id.to_string(), now)?;
            tracing::info!(id = %d.id, url = %d.item.canonical_url, "draft posted");
            report.posted.push(d.id);
        } else {
            tracing::warn!(id = %d.id, "no channel accepted the draft, left pending");
            report.failed.push(d.id);
        }
    }
    drafts.save().context("saving drafts")?;
    Ok(report)
}
