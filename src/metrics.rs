//! Prometheus recorder for a batch job: metrics are rendered once at the end
//! of the run and written to a textfile for the node exporter's collector.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder and describe every curator metric.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition to `path` via a temp file and rename.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp = path.with_extension("prom.tmp");
        let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(self.render().as_bytes())
            .and_then(|_| f.sync_all())
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
        tracing::debug!(path = %path.display(), "metrics textfile written");
        Ok(())
    }
}

pub fn describe_all() {
    describe_counter!("curator_items_fetched_total", "Candidates emitted by collection, by source kind");
    describe_counter!(
        "curator_admission_rejected_total",
        "Stream posts rejected by an admission filter, by reason"
    );
    describe_counter!("curator_dedup_removed_total", "Candidates removed as duplicates, by reason");
    describe_counter!("curator_drafts_created_total", "Drafts that passed every compose gate");
    describe_counter!("curator_compose_rejected_total", "Drafts rejected, by stage");
    describe_counter!("curator_source_errors_total", "Failed source fetches, by source kind");
    describe_histogram!("curator_lint_score", "Style lint score per drafting attempt");
    describe_histogram!("curator_feed_parse_ms", "Feed fetch and parse time in milliseconds");
    describe_gauge!("curator_last_run_ts", "Unix time of the last completed run");
}

pub fn mark_run_finished(now: DateTime<Utc>) {
    gauge!("curator_last_run_ts").set(now.timestamp() as f64);
}
